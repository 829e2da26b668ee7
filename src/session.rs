use actix_web::{web, HttpMessage, HttpRequest, HttpResponse, Responder};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use log::{error, info};
use mongodb::bson::doc;
use serde::Deserialize;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::events::ServerEvent;
use crate::hub::PushToUser;
use crate::models::{MentoringSession, SessionStatus};

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub mentor_id: String,
    pub mentee_id: String,
    pub title: String,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSessionRequest {
    pub title: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    pub status: Option<SessionStatus>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SessionListQuery {
    /// "upcoming", "past" or absent for everything.
    pub filter: Option<String>,
}

pub async fn create_session(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<CreateSessionRequest>,
) -> impl Responder {
    let current_user = match req.extensions().get::<String>() {
        Some(uid) => uid.clone(),
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };
    if current_user != payload.mentor_id && current_user != payload.mentee_id {
        return HttpResponse::Unauthorized().body("Not a participant in this session");
    }

    let now = Utc::now();
    let new_session = MentoringSession {
        session_id: Uuid::new_v4().to_string(),
        mentor_id: payload.mentor_id.clone(),
        mentee_id: payload.mentee_id.clone(),
        title: payload.title.clone(),
        scheduled_at: payload.scheduled_at,
        duration_minutes: payload.duration_minutes.unwrap_or(60),
        status: SessionStatus::Active,
        notes: payload.notes.clone(),
        created_at: now,
        updated_at: now,
    };

    let sessions = data.mongodb.db.collection::<MentoringSession>("mentoring_sessions");
    match sessions.insert_one(&new_session).await {
        Ok(_) => {
            info!("Session {} scheduled", new_session.session_id);
            // Tell the other party right away.
            let other = if current_user == new_session.mentor_id {
                &new_session.mentee_id
            } else {
                &new_session.mentor_id
            };
            data.hub.do_send(PushToUser {
                user_id: other.clone(),
                event: ServerEvent::Notification(serde_json::json!({
                    "kind": "session-scheduled",
                    "session_id": new_session.session_id,
                    "title": new_session.title,
                    "scheduled_at": new_session.scheduled_at,
                })),
            });
            HttpResponse::Ok().json(new_session)
        }
        Err(e) => {
            error!("Error inserting session: {}", e);
            HttpResponse::InternalServerError().body("Error creating session")
        }
    }
}

/// Sessions for the authenticated user, filtered server-side against now.
pub async fn list_sessions(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<SessionListQuery>,
) -> impl Responder {
    let current_user = match req.extensions().get::<String>() {
        Some(uid) => uid.clone(),
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };

    let filter = doc! { "$or": [
        { "mentor_id": &current_user },
        { "mentee_id": &current_user },
    ]};
    let sessions = data.mongodb.db.collection::<MentoringSession>("mentoring_sessions");
    let mut cursor = match sessions.find(filter).await {
        Ok(cursor) => cursor,
        Err(e) => {
            error!("Error fetching sessions: {}", e);
            return HttpResponse::InternalServerError().body("Error fetching sessions");
        }
    };

    let now = Utc::now();
    let mut result = Vec::new();
    while let Some(session_res) = cursor.next().await {
        match session_res {
            Ok(session) => {
                let keep = match query.filter.as_deref() {
                    Some("upcoming") => session.scheduled_at >= now,
                    Some("past") => session.scheduled_at < now,
                    _ => true,
                };
                if keep {
                    result.push(session);
                }
            }
            Err(e) => {
                error!("Error iterating sessions: {}", e);
                return HttpResponse::InternalServerError().body("Error fetching sessions");
            }
        }
    }
    HttpResponse::Ok().json(result)
}

pub async fn get_session(
    req: HttpRequest,
    data: web::Data<AppState>,
    session_id: web::Path<String>,
) -> impl Responder {
    let current_user = match req.extensions().get::<String>() {
        Some(uid) => uid.clone(),
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };
    let sessions = data.mongodb.db.collection::<MentoringSession>("mentoring_sessions");
    let filter = doc! {
        "_id": &*session_id,
        "$or": [ { "mentor_id": &current_user }, { "mentee_id": &current_user } ],
    };
    match sessions.find_one(filter).await {
        Ok(Some(session)) => HttpResponse::Ok().json(session),
        Ok(None) => HttpResponse::NotFound().body("Session not found"),
        Err(e) => {
            error!("Error fetching session: {}", e);
            HttpResponse::InternalServerError().body("Error fetching session")
        }
    }
}

pub async fn update_session(
    req: HttpRequest,
    data: web::Data<AppState>,
    session_id: web::Path<String>,
    payload: web::Json<UpdateSessionRequest>,
) -> impl Responder {
    let current_user = match req.extensions().get::<String>() {
        Some(uid) => uid.clone(),
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };

    let mut update_doc = doc! {};
    if let Some(title) = &payload.title {
        update_doc.insert("title", title);
    }
    if let Some(scheduled_at) = &payload.scheduled_at {
        if let Ok(b) = mongodb::bson::to_bson(scheduled_at) {
            update_doc.insert("scheduled_at", b);
        }
    }
    if let Some(duration) = payload.duration_minutes {
        update_doc.insert("duration_minutes", duration);
    }
    if let Some(status) = &payload.status {
        if let Ok(b) = mongodb::bson::to_bson(status) {
            update_doc.insert("status", b);
        }
    }
    if let Some(notes) = &payload.notes {
        update_doc.insert("notes", notes);
    }
    if update_doc.is_empty() {
        return HttpResponse::BadRequest().body("No fields to update");
    }
    if let Ok(b) = mongodb::bson::to_bson(&Utc::now()) {
        update_doc.insert("updated_at", b);
    }

    let sessions = data.mongodb.db.collection::<MentoringSession>("mentoring_sessions");
    let filter = doc! {
        "_id": &*session_id,
        "$or": [ { "mentor_id": &current_user }, { "mentee_id": &current_user } ],
    };
    match sessions.update_one(filter, doc! { "$set": update_doc }).await {
        Ok(res) => {
            if res.matched_count == 0 {
                HttpResponse::NotFound().body("Session not found")
            } else {
                HttpResponse::Ok().json(serde_json::json!({ "status": "Session updated" }))
            }
        }
        Err(e) => {
            error!("Error updating session: {}", e);
            HttpResponse::InternalServerError().body("Error updating session")
        }
    }
}

pub async fn delete_session(
    req: HttpRequest,
    data: web::Data<AppState>,
    session_id: web::Path<String>,
) -> impl Responder {
    let current_user = match req.extensions().get::<String>() {
        Some(uid) => uid.clone(),
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };
    let sessions = data.mongodb.db.collection::<MentoringSession>("mentoring_sessions");
    let filter = doc! {
        "_id": &*session_id,
        "$or": [ { "mentor_id": &current_user }, { "mentee_id": &current_user } ],
    };
    match sessions.delete_one(filter).await {
        Ok(res) => {
            if res.deleted_count == 0 {
                HttpResponse::NotFound().body("Session not found")
            } else {
                HttpResponse::Ok().json(serde_json::json!({ "status": "Session deleted" }))
            }
        }
        Err(e) => {
            error!("Error deleting session: {}", e);
            HttpResponse::InternalServerError().body("Error deleting session")
        }
    }
}
