//! Wire events for the real-time channel.
//!
//! Every frame is a JSON object `{"event": <name>, "data": {...}}`. The event
//! names are part of the client contract and must not change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events a client may send over the websocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Legacy presence signal. Collapses into one registration server-side.
    #[serde(rename = "join")]
    Join { user_id: String },
    /// Legacy presence signal, same as `join`.
    #[serde(rename = "join-room")]
    JoinRoom { room: String },
    /// Presence signal carrying the user's role.
    #[serde(rename = "user-online")]
    UserOnline {
        user_id: String,
        role: Option<String>,
        timestamp: Option<DateTime<Utc>>,
    },
    /// Place a call. `payload` is an opaque placeholder for media negotiation.
    #[serde(rename = "video-offer")]
    VideoOffer {
        to: String,
        caller_name: String,
        #[serde(default)]
        payload: Value,
    },
    #[serde(rename = "accept-call")]
    AcceptCall { call_id: String },
    #[serde(rename = "reject-call")]
    RejectCall {
        call_id: String,
        reason: Option<String>,
    },
}

/// Events the server pushes to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Acknowledges presence registration, sent once per connection.
    #[serde(rename = "user-online")]
    UserOnline {
        user_id: String,
        role: Option<String>,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "notification")]
    Notification(Value),
    #[serde(rename = "mentorshipRequestUpdate")]
    MentorshipRequestUpdate(Value),
    #[serde(rename = "newMessage")]
    NewMessage(Value),
    #[serde(rename = "newMessageNotification")]
    NewMessageNotification {
        conversation_id: String,
        sender_id: String,
        sender_name: String,
        preview: String,
    },
    #[serde(rename = "newTask")]
    NewTask(Value),
    #[serde(rename = "chatSessionEnded")]
    ChatSessionEnded {
        conversation_id: String,
        ended_by: String,
    },
    #[serde(rename = "video-offer")]
    VideoOffer {
        call_id: String,
        from: String,
        caller_name: String,
        payload: Value,
    },
    #[serde(rename = "accept-call")]
    AcceptCall { call_id: String, by: String },
    #[serde(rename = "reject-call")]
    RejectCall {
        call_id: String,
        by: Option<String>,
        reason: String,
    },
    #[serde(rename = "error")]
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_three_presence_signals() {
        let join: ClientEvent =
            serde_json::from_str(r#"{"event":"join","data":{"user_id":"u1"}}"#).unwrap();
        assert!(matches!(join, ClientEvent::Join { .. }));

        let room: ClientEvent =
            serde_json::from_str(r#"{"event":"join-room","data":{"room":"user-u1"}}"#).unwrap();
        assert!(matches!(room, ClientEvent::JoinRoom { .. }));

        let online: ClientEvent = serde_json::from_str(
            r#"{"event":"user-online","data":{"user_id":"u1","role":"mentee","timestamp":"2026-08-23T10:00:00Z"}}"#,
        )
        .unwrap();
        match online {
            ClientEvent::UserOnline {
                user_id,
                role,
                timestamp,
            } => {
                assert_eq!(user_id, "u1");
                assert_eq!(role.as_deref(), Some("mentee"));
                // Forwarded to the hub as the presence lease time.
                let expected: DateTime<Utc> = "2026-08-23T10:00:00Z".parse().unwrap();
                assert_eq!(timestamp, Some(expected));
            }
            other => panic!("unexpected event: {:?}", other),
        }

        // timestamp stays optional for the older join-style clients
        let online: ClientEvent = serde_json::from_str(
            r#"{"event":"user-online","data":{"user_id":"u1","role":null}}"#,
        )
        .unwrap();
        match online {
            ClientEvent::UserOnline { timestamp, .. } => assert!(timestamp.is_none()),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn video_offer_payload_defaults_to_null() {
        let offer: ClientEvent = serde_json::from_str(
            r#"{"event":"video-offer","data":{"to":"u2","caller_name":"Ana"}}"#,
        )
        .unwrap();
        match offer {
            ClientEvent::VideoOffer { to, payload, .. } => {
                assert_eq!(to, "u2");
                assert!(payload.is_null());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn server_events_use_contract_names() {
        let ev = ServerEvent::ChatSessionEnded {
            conversation_id: "c1".to_string(),
            ended_by: "u1".to_string(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], "chatSessionEnded");
        assert_eq!(json["data"]["conversation_id"], "c1");

        let ev = ServerEvent::RejectCall {
            call_id: "x".to_string(),
            by: None,
            reason: "timeout".to_string(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], "reject-call");
        assert_eq!(json["data"]["reason"], "timeout");
    }
}
