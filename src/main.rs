// src/main.rs

mod app_state;
mod auth;
mod call;
mod chat;
mod config;
mod db;
mod debug;
mod events;
mod goal;
mod hub;
mod mentorship;
mod models;
mod notification;
mod presence;
mod session;
mod task;
mod web_socket_server;

use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll};

use actix::Actor;
use actix_cors::Cors;
use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http,
    middleware::Logger,
    web, App, Error, HttpMessage, HttpResponse, HttpServer,
};
use env_logger::Env;
use futures::future::{ok, Ready};
use log::info;
use mongodb::bson::doc;

use crate::app_state::AppState;
use crate::auth::{login, logout, signup, validate_jwt};
use crate::chat::{
    create_conversation, end_conversation, get_messages, get_user_conversations, send_message,
};
use crate::goal::{create_goal, delete_goal, get_goal, list_goals, toggle_milestone, update_goal};
use crate::mentorship::{
    accept_request, create_request, get_profile, list_mentee_connections, list_mentors,
    list_requests, reject_request, update_profile,
};
use crate::models::AuthSession;
use crate::notification::{acknowledge_notification, clear_notifications, list_notifications};
use crate::session::{
    create_session, delete_session, get_session, list_sessions, update_session,
};
use crate::task::{create_task, delete_task, list_tasks, update_task};
use crate::web_socket_server::ws_index;

#[derive(Debug)]
pub struct Authentication;

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = AuthMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddleware {
            service: Rc::new(service),
        })
    }
}

pub struct AuthMiddleware<S> {
    service: Rc<S>,
}

/// Paths that carry their own authentication (or none). Logout is NOT
/// exempt: it needs the authenticated user id to find the session to drop.
fn skip_auth(path: &str) -> bool {
    path == "/api/auth/signup"
        || path == "/api/auth/login"
        || path.starts_with("/ws")
        || path == "/api/debug/health"
}

impl<S, B> Service<ServiceRequest> for AuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        Box::pin(async move {
            if !skip_auth(req.path()) {
                // Extract "Bearer <token>" from the Authorization header if present
                let bearer = req
                    .headers()
                    .get(http::header::AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .filter(|s| s.starts_with("Bearer "))
                    .map(|s| s.trim_start_matches("Bearer ").trim().to_string());

                if let Some(token) = bearer {
                    let state = req
                        .app_data::<web::Data<AppState>>()
                        .expect("AppState not configured")
                        .clone();
                    let user_id = match validate_jwt(&token, &state.config.jwt_secret) {
                        Ok(claims) => claims.sub,
                        Err(e) => {
                            let resp = HttpResponse::Unauthorized()
                                .body(format!("Invalid token: {}", e));
                            return Ok(req.into_response(resp));
                        }
                    };

                    // The token alone is not enough: the session id issued at
                    // login must still exist server-side.
                    let session_id = req
                        .headers()
                        .get("X-Session-ID")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    let Some(session_id) = session_id else {
                        let resp =
                            HttpResponse::Unauthorized().body("Missing X-Session-ID header");
                        return Ok(req.into_response(resp));
                    };
                    let sessions = state.mongodb.db.collection::<AuthSession>("auth_sessions");
                    match sessions
                        .find_one(doc! { "_id": &session_id, "user_id": &user_id })
                        .await
                    {
                        Ok(Some(_)) => {
                            req.extensions_mut().insert(user_id);
                        }
                        Ok(None) => {
                            let resp = HttpResponse::Unauthorized().body("Session not found");
                            return Ok(req.into_response(resp));
                        }
                        Err(e) => {
                            let resp = HttpResponse::InternalServerError()
                                .body(format!("Error checking session: {}", e));
                            return Ok(req.into_response(resp));
                        }
                    }
                }
            }

            let res = service.call(req).await?;
            Ok(res.map_into_boxed_body())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::skip_auth;

    #[test]
    fn logout_goes_through_the_auth_middleware() {
        // Only the credential-issuing endpoints bypass authentication;
        // logout must see the user-id extension to drop its session.
        assert!(skip_auth("/api/auth/signup"));
        assert!(skip_auth("/api/auth/login"));
        assert!(!skip_auth("/api/auth/logout"));
    }

    #[test]
    fn websocket_and_health_are_exempt() {
        assert!(skip_auth("/ws"));
        assert!(skip_auth("/api/debug/health"));
        assert!(!skip_auth("/api/debug/sockets"));
        assert!(!skip_auth("/api/goals"));
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = config::Config::from_env();
    let mongodb = Arc::new(db::MongoDB::init(&config.mongo_uri, &config.database_name).await);
    let hub = hub::NotificationHub::new(config.call_ring_timeout_secs).start();

    info!("Server running at http://{}", config.bind_addr);
    info!("Allowed CORS origin: {}", config.frontend_origin);

    let bind_addr = config.bind_addr.clone();
    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&config.frontend_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                http::header::CONTENT_TYPE,
                http::header::ACCEPT,
                http::header::AUTHORIZATION,
            ])
            .allowed_header("X-Session-ID")
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .wrap(Authentication)
            .app_data(web::Data::new(AppState {
                hub: hub.clone(),
                mongodb: mongodb.clone(),
                config: config.clone(),
            }))
            .service(
                web::scope("/api/auth")
                    .route("/signup", web::post().to(signup))
                    .route("/login", web::post().to(login))
                    .route("/logout", web::post().to(logout)),
            )
            // GOALS
            .service(
                web::scope("/api/goals")
                    .route("", web::post().to(create_goal))
                    .route("/mentee/{mentee_id}", web::get().to(list_goals))
                    .route("/{goal_id}", web::get().to(get_goal))
                    .route("/{goal_id}", web::put().to(update_goal))
                    .route("/{goal_id}", web::delete().to(delete_goal))
                    .route(
                        "/{goal_id}/milestones/{index}",
                        web::put().to(toggle_milestone),
                    ),
            )
            // TASKS
            .service(
                web::scope("/api/tasks")
                    .route("", web::post().to(create_task))
                    .route("", web::get().to(list_tasks))
                    .route("/{task_id}", web::put().to(update_task))
                    .route("/{task_id}", web::delete().to(delete_task)),
            )
            // SESSIONS
            .service(
                web::scope("/api/sessions")
                    .route("", web::post().to(create_session))
                    .route("", web::get().to(list_sessions))
                    .route("/{session_id}", web::get().to(get_session))
                    .route("/{session_id}", web::put().to(update_session))
                    .route("/{session_id}", web::delete().to(delete_session)),
            )
            // CHAT
            .service(
                web::scope("/api/chat")
                    .route("/conversations", web::post().to(create_conversation))
                    .route(
                        "/conversations/{user_id}",
                        web::get().to(get_user_conversations),
                    )
                    .route(
                        "/conversations/{conversation_id}/end",
                        web::post().to(end_conversation),
                    )
                    .route("/messages/{conversation_id}", web::get().to(get_messages))
                    .route("/messages/{conversation_id}", web::post().to(send_message)),
            )
            // MENTORS (static segments registered before the {mentor_id} catch-all)
            .service(
                web::scope("/api/mentors")
                    .route("", web::get().to(list_mentors))
                    .route("/requests", web::get().to(list_requests))
                    .route(
                        "/requests/{request_id}/accept",
                        web::post().to(accept_request),
                    )
                    .route(
                        "/requests/{request_id}/reject",
                        web::post().to(reject_request),
                    )
                    .route("/{mentor_id}", web::get().to(get_profile))
                    .route("/{mentor_id}", web::put().to(update_profile))
                    .route("/{mentor_id}/requests", web::post().to(create_request)),
            )
            // MENTEES
            .service(
                web::scope("/api/mentees")
                    .route("/{mentee_id}", web::get().to(get_profile))
                    .route("/{mentee_id}", web::put().to(update_profile))
                    .route(
                        "/{mentee_id}/connections",
                        web::get().to(list_mentee_connections),
                    ),
            )
            // NOTIFICATIONS
            .service(
                web::scope("/api/notifications")
                    .route("", web::get().to(list_notifications))
                    .route(
                        "/{notification_id}/ack",
                        web::post().to(acknowledge_notification),
                    )
                    .route("", web::delete().to(clear_notifications)),
            )
            // DEBUG
            .service(
                web::scope("/api/debug")
                    .route("/health", web::get().to(debug::health))
                    .route("/sockets", web::get().to(debug::sockets)),
            )
            // WEBSOCKET route for real-time
            .service(web::resource("/ws").route(web::get().to(ws_index)))
    })
    .bind(&bind_addr)?
    .run()
    .await
}
