//! The shared real-time multiplexer.
//!
//! One `NotificationHub` actor per process. Websocket sessions register here,
//! REST handlers push events through here, and the hub owns the presence
//! registry and the call table, including the server-enforced ring timeout.

use actix::prelude::*;
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

use crate::call::{CallSession, CallTable};
use crate::events::ServerEvent;
use crate::presence::{PresenceRegistry, PresenceSnapshot};

#[derive(Message)]
#[rtype(result = "()")]
pub struct OutboundEvent(pub ServerEvent);

#[derive(Message)]
#[rtype(result = "()")]
pub struct Connect {
    pub conn_id: Uuid,
    pub user_id: String,
    pub addr: Recipient<OutboundEvent>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Disconnect {
    pub conn_id: Uuid,
    pub user_id: String,
    pub addr: Recipient<OutboundEvent>,
}

/// A presence claim from one of the legacy join signals. Idempotent per
/// connection; the first one earns a `user-online` acknowledgement.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Announce {
    pub conn_id: Uuid,
    pub user_id: String,
    pub role: Option<String>,
    /// Client-claimed announce time from `user-online`; server time otherwise.
    pub claimed_at: Option<DateTime<Utc>>,
    pub addr: Recipient<OutboundEvent>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Heartbeat {
    pub conn_id: Uuid,
}

/// Fan an event out to every connection a user has open.
#[derive(Message)]
#[rtype(result = "()")]
pub struct PushToUser {
    pub user_id: String,
    pub event: ServerEvent,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct PlaceCall {
    pub caller_id: String,
    pub caller_name: String,
    pub callee_id: String,
    pub payload: Value,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct AnswerCall {
    pub user_id: String,
    pub call_id: String,
    pub accept: bool,
    pub reason: Option<String>,
}

#[derive(Message)]
#[rtype(result = "()")]
struct RingTimeout {
    call_id: String,
}

#[derive(Message)]
#[rtype(result = "Vec<PresenceSnapshot>")]
pub struct GetPresenceSnapshot;

pub struct NotificationHub {
    // Multiple connections per user (several tabs/devices).
    sessions: HashMap<String, Vec<Recipient<OutboundEvent>>>,
    presence: PresenceRegistry,
    calls: CallTable,
    ring_timeout: Duration,
}

impl NotificationHub {
    pub fn new(ring_timeout_secs: u64) -> Self {
        NotificationHub {
            sessions: HashMap::new(),
            presence: PresenceRegistry::default(),
            calls: CallTable::default(),
            ring_timeout: Duration::from_secs(ring_timeout_secs),
        }
    }

    fn push_to_user(&self, user_id: &str, event: &ServerEvent) {
        if let Some(addrs) = self.sessions.get(user_id) {
            for addr in addrs {
                addr.do_send(OutboundEvent(event.clone()));
            }
        }
    }
}

impl Actor for NotificationHub {
    type Context = Context<Self>;
}

impl Handler<Connect> for NotificationHub {
    type Result = ();

    fn handle(&mut self, msg: Connect, _: &mut Context<Self>) {
        info!("User {} connected (WS), conn {}", msg.user_id, msg.conn_id);
        self.sessions
            .entry(msg.user_id.clone())
            .or_default()
            .push(msg.addr);
    }
}

impl Handler<Disconnect> for NotificationHub {
    type Result = ();

    fn handle(&mut self, msg: Disconnect, _: &mut Context<Self>) {
        info!("User {} disconnected (WS), conn {}", msg.user_id, msg.conn_id);
        if let Some(addrs) = self.sessions.get_mut(&msg.user_id) {
            // Remove only the connection that matches the provided address.
            addrs.retain(|a| a != &msg.addr);
            if addrs.is_empty() {
                self.sessions.remove(&msg.user_id);
            }
        }
        self.presence.disconnect(msg.conn_id);

        // A dropped connection ends any call the user was in.
        for (call_id, peer_id) in self.calls.end_for_user(&msg.user_id) {
            self.push_to_user(
                &peer_id,
                &ServerEvent::RejectCall {
                    call_id,
                    by: Some(msg.user_id.clone()),
                    reason: "disconnected".to_string(),
                },
            );
        }
    }
}

impl Handler<Announce> for NotificationHub {
    type Result = ();

    fn handle(&mut self, msg: Announce, _: &mut Context<Self>) {
        let now = msg.claimed_at.unwrap_or_else(Utc::now);
        let first = self
            .presence
            .announce(msg.conn_id, &msg.user_id, msg.role.clone(), now);
        if first {
            // Single acknowledged receipt, regardless of how many join
            // signals the client fires.
            msg.addr.do_send(OutboundEvent(ServerEvent::UserOnline {
                user_id: msg.user_id,
                role: msg.role,
                timestamp: now,
            }));
        }
    }
}

impl Handler<Heartbeat> for NotificationHub {
    type Result = ();

    fn handle(&mut self, msg: Heartbeat, _: &mut Context<Self>) {
        self.presence.heartbeat(msg.conn_id, Utc::now());
    }
}

impl Handler<PushToUser> for NotificationHub {
    type Result = ();

    fn handle(&mut self, msg: PushToUser, _: &mut Context<Self>) {
        self.push_to_user(&msg.user_id, &msg.event);
    }
}

impl Handler<PlaceCall> for NotificationHub {
    type Result = ();

    fn handle(&mut self, msg: PlaceCall, ctx: &mut Context<Self>) {
        // One non-ended call per user, on both sides of the offer.
        if let Some(existing) = self.calls.find_for_user(&msg.caller_id) {
            info!(
                "Call from {} refused, caller already in call {}",
                msg.caller_id, existing.call_id
            );
            self.push_to_user(
                &msg.caller_id,
                &ServerEvent::Error {
                    message: "You are already in a call".to_string(),
                },
            );
            return;
        }
        if !self.sessions.contains_key(&msg.callee_id) {
            self.push_to_user(
                &msg.caller_id,
                &ServerEvent::Error {
                    message: format!("User {} is not online", msg.callee_id),
                },
            );
            return;
        }
        if let Some(existing) = self.calls.find_for_user(&msg.callee_id) {
            info!(
                "Call to {} refused, already in call {}",
                msg.callee_id, existing.call_id
            );
            self.push_to_user(
                &msg.caller_id,
                &ServerEvent::Error {
                    message: format!("User {} is already in a call", msg.callee_id),
                },
            );
            return;
        }

        let call = CallSession::new(&msg.caller_id, &msg.callee_id, &msg.caller_name, msg.payload);
        let call_id = call.call_id.clone();
        info!(
            "Call {} placed: {} -> {}",
            call_id, msg.caller_id, msg.callee_id
        );
        self.push_to_user(
            &msg.callee_id,
            &ServerEvent::VideoOffer {
                call_id: call_id.clone(),
                from: msg.caller_id.clone(),
                caller_name: msg.caller_name.clone(),
                payload: call.payload.clone(),
            },
        );
        self.calls.insert(call);

        // The server ends an unanswered call for both parties.
        ctx.notify_later(RingTimeout { call_id }, self.ring_timeout);
    }
}

impl Handler<AnswerCall> for NotificationHub {
    type Result = ();

    fn handle(&mut self, msg: AnswerCall, _: &mut Context<Self>) {
        let Some(call) = self.calls.get_mut(&msg.call_id) else {
            self.push_to_user(
                &msg.user_id,
                &ServerEvent::Error {
                    message: "Call no longer exists".to_string(),
                },
            );
            return;
        };
        if call.peer_of(&msg.user_id).is_none() {
            warn!("User {} answered call {} they are not part of", msg.user_id, msg.call_id);
            return;
        }
        let peer_id = call.peer_of(&msg.user_id).map(str::to_string);

        if msg.accept {
            match call.accept() {
                // Caller goes Active without a further confirmation round-trip.
                Ok(()) => {
                    if let Some(peer) = peer_id {
                        self.push_to_user(
                            &peer,
                            &ServerEvent::AcceptCall {
                                call_id: msg.call_id,
                                by: msg.user_id,
                            },
                        );
                    }
                }
                Err(state) => {
                    warn!("Accept of call {} in state {:?} ignored", msg.call_id, state);
                }
            }
        } else {
            match call.reject() {
                Ok(()) => {
                    self.calls.remove(&msg.call_id);
                    if let Some(peer) = peer_id {
                        self.push_to_user(
                            &peer,
                            &ServerEvent::RejectCall {
                                call_id: msg.call_id,
                                by: Some(msg.user_id),
                                reason: msg.reason.unwrap_or_else(|| "rejected".to_string()),
                            },
                        );
                    }
                }
                Err(state) => {
                    warn!("Reject of call {} in state {:?} ignored", msg.call_id, state);
                }
            }
        }
    }
}

impl Handler<RingTimeout> for NotificationHub {
    type Result = ();

    fn handle(&mut self, msg: RingTimeout, _: &mut Context<Self>) {
        let Some(call) = self.calls.get_mut(&msg.call_id) else {
            return;
        };
        if !call.timeout() {
            // Answered in time; the timer has nothing to do.
            return;
        }
        info!("Call {} rang out", msg.call_id);
        let caller = call.caller_id.clone();
        let callee = call.callee_id.clone();
        self.calls.remove(&msg.call_id);
        for party in [caller, callee] {
            self.push_to_user(
                &party,
                &ServerEvent::RejectCall {
                    call_id: msg.call_id.clone(),
                    by: None,
                    reason: "timeout".to_string(),
                },
            );
        }
    }
}

impl Handler<GetPresenceSnapshot> for NotificationHub {
    type Result = MessageResult<GetPresenceSnapshot>;

    fn handle(&mut self, _: GetPresenceSnapshot, _: &mut Context<Self>) -> Self::Result {
        MessageResult(self.presence.snapshot())
    }
}
