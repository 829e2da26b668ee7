use actix_web::{web, HttpMessage, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use futures_util::StreamExt;
use log::{error, info};
use mongodb::bson::doc;
use serde::Deserialize;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::events::ServerEvent;
use crate::hub::PushToUser;
use crate::models::{ChatConversation, ChatMessage, User};

#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    pub participants: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

pub async fn create_conversation(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<CreateConversationRequest>,
) -> impl Responder {
    let current_user = match req.extensions().get::<String>() {
        Some(uid) => uid.clone(),
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };
    let mut participants = payload.participants.clone();
    if !participants.contains(&current_user) {
        participants.push(current_user);
    }
    if participants.len() < 2 {
        return HttpResponse::BadRequest().body("A conversation needs at least two participants");
    }

    let now = Utc::now();
    let conversation = ChatConversation {
        conversation_id: Uuid::new_v4().to_string(),
        participants,
        active: true,
        created_at: now,
        last_message_at: now,
    };
    let conversations = data.mongodb.db.collection::<ChatConversation>("conversations");
    match conversations.insert_one(&conversation).await {
        Ok(_) => HttpResponse::Ok().json(conversation),
        Err(e) => {
            error!("Error creating conversation: {}", e);
            HttpResponse::InternalServerError().body("Error creating conversation")
        }
    }
}

pub async fn get_user_conversations(
    req: HttpRequest,
    data: web::Data<AppState>,
    user_id: web::Path<String>,
) -> impl Responder {
    let current_user = match req.extensions().get::<String>() {
        Some(uid) => uid.clone(),
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };
    if current_user != *user_id {
        return HttpResponse::Unauthorized().body("Cannot access other user's conversations");
    }

    let conversations = data.mongodb.db.collection::<ChatConversation>("conversations");
    let mut cursor = match conversations.find(doc! { "participants": &*user_id }).await {
        Ok(cursor) => cursor,
        Err(e) => {
            error!("Error fetching conversations: {}", e);
            return HttpResponse::InternalServerError().body("Error fetching conversations");
        }
    };
    let mut result = Vec::new();
    while let Some(conv_res) = cursor.next().await {
        match conv_res {
            Ok(conv) => result.push(conv),
            Err(e) => {
                error!("Error iterating conversations: {}", e);
                return HttpResponse::InternalServerError().body("Error fetching conversations");
            }
        }
    }
    HttpResponse::Ok().json(result)
}

async fn load_conversation_for_member(
    data: &AppState,
    conversation_id: &str,
    user_id: &str,
) -> Result<ChatConversation, HttpResponse> {
    let conversations = data.mongodb.db.collection::<ChatConversation>("conversations");
    match conversations.find_one(doc! { "_id": conversation_id }).await {
        Ok(Some(conv)) => {
            if !conv.participants.iter().any(|p| p == user_id) {
                Err(HttpResponse::Unauthorized().body("Not a participant in this conversation"))
            } else {
                Ok(conv)
            }
        }
        Ok(None) => Err(HttpResponse::NotFound().body("Conversation not found")),
        Err(e) => {
            error!("Error fetching conversation: {}", e);
            Err(HttpResponse::InternalServerError().body("Error fetching conversation"))
        }
    }
}

pub async fn get_messages(
    req: HttpRequest,
    data: web::Data<AppState>,
    conversation_id: web::Path<String>,
) -> impl Responder {
    let current_user = match req.extensions().get::<String>() {
        Some(uid) => uid.clone(),
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };
    if let Err(resp) = load_conversation_for_member(&data, &conversation_id, &current_user).await {
        return resp;
    }

    let messages = data.mongodb.db.collection::<ChatMessage>("messages");
    let mut cursor = match messages.find(doc! { "conversation_id": &*conversation_id }).await {
        Ok(cursor) => cursor,
        Err(e) => {
            error!("Error fetching messages: {}", e);
            return HttpResponse::InternalServerError().body("Error fetching messages");
        }
    };
    let mut result = Vec::new();
    while let Some(msg_res) = cursor.next().await {
        match msg_res {
            Ok(msg) => result.push(msg),
            Err(e) => {
                error!("Error iterating messages: {}", e);
                return HttpResponse::InternalServerError().body("Error fetching messages");
            }
        }
    }
    HttpResponse::Ok().json(result)
}

/// Persist a message, then fan out: `newMessage` to the other participants'
/// open conversations and `newMessageNotification` for their notification UI.
pub async fn send_message(
    req: HttpRequest,
    data: web::Data<AppState>,
    conversation_id: web::Path<String>,
    payload: web::Json<SendMessageRequest>,
) -> impl Responder {
    let current_user = match req.extensions().get::<String>() {
        Some(uid) => uid.clone(),
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };
    let conversation_id = conversation_id.into_inner();
    let conversation =
        match load_conversation_for_member(&data, &conversation_id, &current_user).await {
            Ok(conv) => conv,
            Err(resp) => return resp,
        };
    if !conversation.active {
        return HttpResponse::BadRequest().body("Conversation has ended");
    }

    let new_message = ChatMessage {
        message_id: Uuid::new_v4().to_string(),
        conversation_id: conversation_id.clone(),
        sender_id: current_user.clone(),
        content: payload.content.clone(),
        read: false,
        created_at: Utc::now(),
    };
    let messages = data.mongodb.db.collection::<ChatMessage>("messages");
    if let Err(e) = messages.insert_one(&new_message).await {
        error!("Error inserting message: {}", e);
        return HttpResponse::InternalServerError().body("Error sending message");
    }

    let conversations = data.mongodb.db.collection::<ChatConversation>("conversations");
    if let Ok(b) = mongodb::bson::to_bson(&new_message.created_at) {
        if let Err(e) = conversations
            .update_one(
                doc! { "_id": &conversation_id },
                doc! { "$set": { "last_message_at": b } },
            )
            .await
        {
            error!("Error bumping last_message_at: {}", e);
        }
    }

    let sender_name = {
        let users = data.mongodb.db.collection::<User>("users");
        users
            .find_one(doc! { "_id": &current_user })
            .await
            .ok()
            .flatten()
            .map(|u| u.username)
            .unwrap_or_else(|| current_user.clone())
    };

    let message_json = serde_json::to_value(&new_message).unwrap_or_default();
    for participant in &conversation.participants {
        if participant == &current_user {
            continue;
        }
        data.hub.do_send(PushToUser {
            user_id: participant.clone(),
            event: ServerEvent::NewMessage(message_json.clone()),
        });
        data.hub.do_send(PushToUser {
            user_id: participant.clone(),
            event: ServerEvent::NewMessageNotification {
                conversation_id: conversation_id.clone(),
                sender_id: current_user.clone(),
                sender_name: sender_name.clone(),
                preview: truncate_preview(&new_message.content),
            },
        });
    }

    HttpResponse::Ok().json(new_message)
}

/// Marks the conversation inactive and tells every participant.
pub async fn end_conversation(
    req: HttpRequest,
    data: web::Data<AppState>,
    conversation_id: web::Path<String>,
) -> impl Responder {
    let current_user = match req.extensions().get::<String>() {
        Some(uid) => uid.clone(),
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };
    let conversation_id = conversation_id.into_inner();
    let conversation =
        match load_conversation_for_member(&data, &conversation_id, &current_user).await {
            Ok(conv) => conv,
            Err(resp) => return resp,
        };

    let conversations = data.mongodb.db.collection::<ChatConversation>("conversations");
    match conversations
        .update_one(doc! { "_id": &conversation_id }, doc! { "$set": { "active": false } })
        .await
    {
        Ok(_) => {
            info!("Conversation {} ended by {}", conversation_id, current_user);
            for participant in &conversation.participants {
                data.hub.do_send(PushToUser {
                    user_id: participant.clone(),
                    event: ServerEvent::ChatSessionEnded {
                        conversation_id: conversation_id.clone(),
                        ended_by: current_user.clone(),
                    },
                });
            }
            HttpResponse::Ok().json(serde_json::json!({ "status": "Conversation ended" }))
        }
        Err(e) => {
            error!("Error ending conversation: {}", e);
            HttpResponse::InternalServerError().body("Error ending conversation")
        }
    }
}

fn truncate_preview(content: &str) -> String {
    const MAX: usize = 80;
    if content.chars().count() <= MAX {
        content.to_string()
    } else {
        let cut: String = content.chars().take(MAX).collect();
        format!("{}…", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::truncate_preview;

    #[test]
    fn short_previews_pass_through() {
        assert_eq!(truncate_preview("hi"), "hi");
    }

    #[test]
    fn long_previews_are_truncated() {
        let long = "x".repeat(200);
        let preview = truncate_preview(&long);
        assert_eq!(preview.chars().count(), 81);
        assert!(preview.ends_with('…'));
    }
}
