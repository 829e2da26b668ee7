use actix_web::{web, HttpResponse, Responder};
use chrono::Utc;
use log::error;

use crate::app_state::AppState;
use crate::hub::GetPresenceSnapshot;

pub async fn health(data: web::Data<AppState>) -> impl Responder {
    // A ping proves the database handle is alive, not just the process.
    let db_ok = data
        .mongodb
        .db
        .run_command(mongodb::bson::doc! { "ping": 1 })
        .await
        .is_ok();
    HttpResponse::Ok().json(serde_json::json!({
        "status": if db_ok { "ok" } else { "degraded" },
        "database": db_ok,
        "timestamp": Utc::now(),
    }))
}

/// Snapshot of who is online and with how many connections.
pub async fn sockets(data: web::Data<AppState>) -> impl Responder {
    match data.hub.send(GetPresenceSnapshot).await {
        Ok(snapshot) => HttpResponse::Ok().json(serde_json::json!({
            "online": snapshot.len(),
            "users": snapshot,
        })),
        Err(e) => {
            error!("Error querying hub: {}", e);
            HttpResponse::InternalServerError().body("Error querying socket state")
        }
    }
}
