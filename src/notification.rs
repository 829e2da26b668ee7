//! Server-owned notification inbox.
//!
//! Notifications live in Mongo, scoped to a user, with a read receipt and a
//! TTL. The list endpoint never returns expired entries and purges them as a
//! side effect, so a client reloading a day later starts clean.

use actix_web::{web, HttpMessage, HttpRequest, HttpResponse, Responder};
use chrono::{DateTime, Duration, Utc};
use futures_util::StreamExt;
use log::error;
use mongodb::bson::doc;
use mongodb::Database;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_state::AppState;

/// A durable notification. Field names mirror the payload the client renders
/// (status banner, alert styling, action prompt, rejection details).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoredNotification {
    #[serde(rename = "_id")]
    pub notification_id: String,
    pub user_id: String,
    pub status: String,
    pub message: String,
    pub alert_type: String,
    pub priority: String,
    pub action_required: bool,
    pub rejection_details: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl StoredNotification {
    pub fn new(
        user_id: &str,
        status: &str,
        message: String,
        alert_type: &str,
        priority: &str,
        action_required: bool,
        rejection_details: Option<String>,
    ) -> Self {
        StoredNotification {
            notification_id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            status: status.to_string(),
            message,
            alert_type: alert_type.to_string(),
            priority: priority.to_string(),
            action_required,
            rejection_details,
            read: false,
            created_at: Utc::now(),
        }
    }
}

pub fn is_expired(created_at: DateTime<Utc>, now: DateTime<Utc>, ttl_hours: i64) -> bool {
    now - created_at > Duration::hours(ttl_hours)
}

/// Best-effort enqueue from other handlers; failure to store a notification
/// never fails the operation that produced it.
pub async fn enqueue(db: &Database, notification: StoredNotification) {
    let coll = db.collection::<StoredNotification>("notifications");
    if let Err(e) = coll.insert_one(&notification).await {
        error!(
            "Error storing notification for {}: {}",
            notification.user_id, e
        );
    }
}

/// Unread, unexpired notifications for the authenticated user. Any expired
/// entries encountered are purged as a side effect.
pub async fn list_notifications(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    let current_user = match req.extensions().get::<String>() {
        Some(uid) => uid.clone(),
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };
    let coll = data
        .mongodb
        .db
        .collection::<StoredNotification>("notifications");
    let mut cursor = match coll
        .find(doc! { "user_id": &current_user, "read": false })
        .await
    {
        Ok(cursor) => cursor,
        Err(e) => {
            error!("Error fetching notifications: {}", e);
            return HttpResponse::InternalServerError().body("Error fetching notifications");
        }
    };

    let now = Utc::now();
    let ttl = data.config.notification_ttl_hours;
    let mut notifications = Vec::new();
    let mut expired_ids = Vec::new();
    while let Some(res) = cursor.next().await {
        match res {
            Ok(n) if is_expired(n.created_at, now, ttl) => expired_ids.push(n.notification_id),
            Ok(n) => notifications.push(n),
            Err(e) => {
                error!("Error iterating notifications: {}", e);
                return HttpResponse::InternalServerError().body("Error fetching notifications");
            }
        }
    }

    if !expired_ids.is_empty() {
        if let Err(e) = coll
            .delete_many(doc! { "_id": { "$in": &expired_ids } })
            .await
        {
            error!("Error purging expired notifications: {}", e);
        }
    }
    HttpResponse::Ok().json(notifications)
}

/// Read receipt for one notification.
pub async fn acknowledge_notification(
    req: HttpRequest,
    data: web::Data<AppState>,
    notification_id: web::Path<String>,
) -> impl Responder {
    let current_user = match req.extensions().get::<String>() {
        Some(uid) => uid.clone(),
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };
    let coll = data
        .mongodb
        .db
        .collection::<StoredNotification>("notifications");
    let filter = doc! { "_id": &*notification_id, "user_id": &current_user };
    match coll.update_one(filter, doc! { "$set": { "read": true } }).await {
        Ok(res) => {
            if res.matched_count == 0 {
                HttpResponse::NotFound().body("Notification not found")
            } else {
                HttpResponse::Ok().json(serde_json::json!({ "status": "Acknowledged" }))
            }
        }
        Err(e) => {
            error!("Error acknowledging notification: {}", e);
            HttpResponse::InternalServerError().body("Error acknowledging notification")
        }
    }
}

pub async fn clear_notifications(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    let current_user = match req.extensions().get::<String>() {
        Some(uid) => uid.clone(),
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };
    let coll = data
        .mongodb
        .db
        .collection::<StoredNotification>("notifications");
    match coll.delete_many(doc! { "user_id": &current_user }).await {
        Ok(res) => HttpResponse::Ok().json(serde_json::json!({ "deleted": res.deleted_count })),
        Err(e) => {
            error!("Error clearing notifications: {}", e);
            HttpResponse::InternalServerError().body("Error clearing notifications")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_older_than_ttl_is_expired() {
        let now = Utc::now();
        assert!(is_expired(now - Duration::hours(25), now, 24));
    }

    #[test]
    fn entry_within_ttl_is_kept() {
        let now = Utc::now();
        assert!(!is_expired(now - Duration::hours(23), now, 24));
        assert!(!is_expired(now, now, 24));
    }

    #[test]
    fn new_notifications_start_unread() {
        let n = StoredNotification::new(
            "u1",
            "rejected",
            "Your mentorship request was declined".to_string(),
            "warning",
            "high",
            true,
            Some("Mentor is at capacity".to_string()),
        );
        assert!(!n.read);
        assert_eq!(n.user_id, "u1");
        assert_eq!(n.status, "rejected");
        assert!(n.action_required);
    }
}
