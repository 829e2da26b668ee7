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
use crate::models::{MentorshipRequest, RequestStatus, User, UserProfile};
use crate::notification::{self, StoredNotification};

#[derive(Debug, Deserialize)]
pub struct CreateRequestPayload {
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequestPayload {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub skills: Option<Vec<String>>,
}

/// Mentor directory.
pub async fn list_mentors(data: web::Data<AppState>) -> impl Responder {
    let users = data.mongodb.db.collection::<User>("users");
    let mut cursor = match users.find(doc! { "role": "mentor" }).await {
        Ok(cursor) => cursor,
        Err(e) => {
            error!("Error fetching mentors: {}", e);
            return HttpResponse::InternalServerError().body("Error fetching mentors");
        }
    };
    let mut mentors: Vec<UserProfile> = Vec::new();
    while let Some(user_res) = cursor.next().await {
        match user_res {
            Ok(user) => mentors.push(user.into()),
            Err(e) => {
                error!("Error iterating mentors: {}", e);
                return HttpResponse::InternalServerError().body("Error fetching mentors");
            }
        }
    }
    HttpResponse::Ok().json(mentors)
}

pub async fn get_profile(data: web::Data<AppState>, user_id: web::Path<String>) -> impl Responder {
    let users = data.mongodb.db.collection::<User>("users");
    match users.find_one(doc! { "_id": &*user_id }).await {
        Ok(Some(user)) => HttpResponse::Ok().json(UserProfile::from(user)),
        Ok(None) => HttpResponse::NotFound().body("User not found"),
        Err(e) => {
            error!("Error fetching user: {}", e);
            HttpResponse::InternalServerError().body("Error fetching user")
        }
    }
}

/// Users may only edit their own profile.
pub async fn update_profile(
    req: HttpRequest,
    data: web::Data<AppState>,
    user_id: web::Path<String>,
    payload: web::Json<UpdateProfileRequest>,
) -> impl Responder {
    let current_user = match req.extensions().get::<String>() {
        Some(uid) => uid.clone(),
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };
    if current_user != *user_id {
        return HttpResponse::Unauthorized().body("Cannot edit another user's profile");
    }

    let mut update_doc = doc! {};
    if let Some(full_name) = &payload.full_name {
        update_doc.insert("full_name", full_name);
    }
    if let Some(bio) = &payload.bio {
        update_doc.insert("bio", bio);
    }
    if let Some(skills) = &payload.skills {
        update_doc.insert("skills", skills);
    }
    if update_doc.is_empty() {
        return HttpResponse::BadRequest().body("No fields to update");
    }

    let users = data.mongodb.db.collection::<User>("users");
    match users
        .update_one(doc! { "_id": &*user_id }, doc! { "$set": update_doc })
        .await
    {
        Ok(res) => {
            if res.matched_count == 0 {
                HttpResponse::NotFound().body("User not found")
            } else {
                HttpResponse::Ok().json(serde_json::json!({ "status": "Profile updated" }))
            }
        }
        Err(e) => {
            error!("Error updating profile: {}", e);
            HttpResponse::InternalServerError().body("Error updating profile")
        }
    }
}

/// Mentee asks a mentor for mentorship. The mentor gets a live notification.
pub async fn create_request(
    req: HttpRequest,
    data: web::Data<AppState>,
    mentor_id: web::Path<String>,
    payload: web::Json<CreateRequestPayload>,
) -> impl Responder {
    let current_user = match req.extensions().get::<String>() {
        Some(uid) => uid.clone(),
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };
    let mentor_id = mentor_id.into_inner();

    let requests = data.mongodb.db.collection::<MentorshipRequest>("mentorship_requests");
    let duplicate = requests
        .find_one(doc! {
            "mentor_id": &mentor_id,
            "mentee_id": &current_user,
            "status": "pending",
        })
        .await;
    match duplicate {
        Ok(Some(_)) => return HttpResponse::Conflict().body("A pending request already exists"),
        Ok(None) => {}
        Err(e) => {
            error!("Error checking existing request: {}", e);
            return HttpResponse::InternalServerError().body("Error creating request");
        }
    }

    let new_request = MentorshipRequest {
        request_id: Uuid::new_v4().to_string(),
        mentor_id: mentor_id.clone(),
        mentee_id: current_user.clone(),
        message: payload.message.clone(),
        status: RequestStatus::Pending,
        rejection_details: None,
        sent_at: Utc::now(),
        responded_at: None,
    };
    match requests.insert_one(&new_request).await {
        Ok(_) => {
            info!("Mentorship request {} sent to {}", new_request.request_id, mentor_id);
            data.hub.do_send(PushToUser {
                user_id: mentor_id,
                event: ServerEvent::Notification(serde_json::json!({
                    "kind": "mentorship-request",
                    "request_id": new_request.request_id,
                    "mentee_id": current_user,
                })),
            });
            HttpResponse::Ok().json(new_request)
        }
        Err(e) => {
            error!("Error inserting request: {}", e);
            HttpResponse::InternalServerError().body("Error creating request")
        }
    }
}

/// Pending requests addressed to the authenticated mentor.
pub async fn list_requests(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    let current_user = match req.extensions().get::<String>() {
        Some(uid) => uid.clone(),
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };
    let requests = data.mongodb.db.collection::<MentorshipRequest>("mentorship_requests");
    let mut cursor = match requests
        .find(doc! { "mentor_id": &current_user, "status": "pending" })
        .await
    {
        Ok(cursor) => cursor,
        Err(e) => {
            error!("Error fetching requests: {}", e);
            return HttpResponse::InternalServerError().body("Error fetching requests");
        }
    };
    let mut result = Vec::new();
    while let Some(req_res) = cursor.next().await {
        match req_res {
            Ok(r) => result.push(r),
            Err(e) => {
                error!("Error iterating requests: {}", e);
                return HttpResponse::InternalServerError().body("Error fetching requests");
            }
        }
    }
    HttpResponse::Ok().json(result)
}

async fn respond_to_request(
    data: &AppState,
    mentor_id: &str,
    request_id: &str,
    accept: bool,
    rejection_details: Option<String>,
) -> HttpResponse {
    let requests = data.mongodb.db.collection::<MentorshipRequest>("mentorship_requests");
    let mut request = match requests
        .find_one(doc! { "_id": request_id, "mentor_id": mentor_id })
        .await
    {
        Ok(Some(r)) => r,
        Ok(None) => return HttpResponse::NotFound().body("Request not found"),
        Err(e) => {
            error!("Error fetching request: {}", e);
            return HttpResponse::InternalServerError().body("Error responding to request");
        }
    };
    if request.status != RequestStatus::Pending {
        return HttpResponse::BadRequest().body("Request already responded to");
    }

    request.status = if accept {
        RequestStatus::Accepted
    } else {
        RequestStatus::Rejected
    };
    request.rejection_details = rejection_details.clone();
    request.responded_at = Some(Utc::now());

    if let Err(e) = requests
        .replace_one(doc! { "_id": request_id }, &request)
        .await
    {
        error!("Error updating request: {}", e);
        return HttpResponse::InternalServerError().body("Error responding to request");
    }

    let (status, alert_type, priority, message) = if accept {
        (
            "accepted",
            "success",
            "medium",
            "Your mentorship request was accepted".to_string(),
        )
    } else {
        (
            "rejected",
            "warning",
            "high",
            "Your mentorship request was declined".to_string(),
        )
    };

    // Live push for clients that are online right now.
    data.hub.do_send(PushToUser {
        user_id: request.mentee_id.clone(),
        event: ServerEvent::MentorshipRequestUpdate(serde_json::json!({
            "request_id": request.request_id,
            "mentor_id": request.mentor_id,
            "status": status,
            "message": message,
            "timestamp": Utc::now(),
            "alertType": alert_type,
            "priority": priority,
            "actionRequired": !accept,
            "rejectionDetails": rejection_details,
        })),
    });

    // Durable inbox entry for clients that are not; expires after the TTL.
    notification::enqueue(
        &data.mongodb.db,
        StoredNotification::new(
            &request.mentee_id,
            status,
            message,
            alert_type,
            priority,
            !accept,
            rejection_details,
        ),
    )
    .await;

    info!("Mentorship request {} {}", request.request_id, status);
    HttpResponse::Ok().json(request)
}

pub async fn accept_request(
    req: HttpRequest,
    data: web::Data<AppState>,
    request_id: web::Path<String>,
) -> impl Responder {
    let current_user = match req.extensions().get::<String>() {
        Some(uid) => uid.clone(),
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };
    respond_to_request(&data, &current_user, &request_id, true, None).await
}

pub async fn reject_request(
    req: HttpRequest,
    data: web::Data<AppState>,
    request_id: web::Path<String>,
    payload: web::Json<RejectRequestPayload>,
) -> impl Responder {
    let current_user = match req.extensions().get::<String>() {
        Some(uid) => uid.clone(),
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };
    respond_to_request(&data, &current_user, &request_id, false, payload.reason.clone()).await
}

/// The mentee's accepted mentorship connections.
pub async fn list_mentee_connections(
    req: HttpRequest,
    data: web::Data<AppState>,
    mentee_id: web::Path<String>,
) -> impl Responder {
    let current_user = match req.extensions().get::<String>() {
        Some(uid) => uid.clone(),
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };
    if current_user != *mentee_id {
        return HttpResponse::Unauthorized().body("Cannot access other user's connections");
    }
    let requests = data.mongodb.db.collection::<MentorshipRequest>("mentorship_requests");
    let mut cursor = match requests
        .find(doc! { "mentee_id": &*mentee_id, "status": "accepted" })
        .await
    {
        Ok(cursor) => cursor,
        Err(e) => {
            error!("Error fetching connections: {}", e);
            return HttpResponse::InternalServerError().body("Error fetching connections");
        }
    };
    let mut result = Vec::new();
    while let Some(req_res) = cursor.next().await {
        match req_res {
            Ok(r) => result.push(r),
            Err(e) => {
                error!("Error iterating connections: {}", e);
                return HttpResponse::InternalServerError().body("Error fetching connections");
            }
        }
    }
    HttpResponse::Ok().json(result)
}
