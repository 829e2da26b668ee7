use actix::prelude::*;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use log::{debug, warn};
use serde::Deserialize;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::validate_jwt;
use crate::events::{ClientEvent, ServerEvent};
use crate::hub::{
    Announce, AnswerCall, Connect, Disconnect, Heartbeat, NotificationHub, OutboundEvent,
    PlaceCall,
};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Deserialize)]
pub struct WsQuery {
    token: String,
}

/// Websocket entry point. The token is authenticated at handshake time; a
/// missing or invalid token rejects the upgrade instead of silently no-oping.
pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    data: web::Data<AppState>,
    query: web::Query<WsQuery>,
) -> Result<HttpResponse, Error> {
    let claims = match validate_jwt(&query.token, &data.config.jwt_secret) {
        Ok(claims) => claims,
        Err(e) => {
            warn!("WS handshake rejected: {}", e);
            return Ok(HttpResponse::Unauthorized().body("Invalid token"));
        }
    };
    let session = WsSession {
        conn_id: Uuid::new_v4(),
        user_id: claims.sub,
        hb: Instant::now(),
        hub: data.hub.clone(),
    };
    ws::start(session, &req, stream)
}

pub struct WsSession {
    pub conn_id: Uuid,
    pub user_id: String,
    pub hb: Instant,
    pub hub: Addr<NotificationHub>,
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.hb(ctx);
        self.hub.do_send(Connect {
            conn_id: self.conn_id,
            user_id: self.user_id.clone(),
            addr: ctx.address().recipient(),
        });
    }

    fn stopped(&mut self, ctx: &mut Self::Context) {
        // Registration is released here, tied to the connection's lifetime.
        self.hub.do_send(Disconnect {
            conn_id: self.conn_id,
            user_id: self.user_id.clone(),
            addr: ctx.address().recipient(),
        });
    }
}

impl WsSession {
    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                warn!("WS heartbeat failed for user {}, disconnecting", act.user_id);
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn handle_event(&mut self, event: ClientEvent, ctx: &mut ws::WebsocketContext<Self>) {
        match event {
            // The three legacy presence signals collapse into one
            // registration; the hub ignores duplicates.
            ClientEvent::Join { user_id } => {
                if user_id != self.user_id {
                    debug!(
                        "join signal claimed {} but token says {}",
                        user_id, self.user_id
                    );
                }
                self.hub.do_send(Announce {
                    conn_id: self.conn_id,
                    user_id: self.user_id.clone(),
                    role: None,
                    claimed_at: None,
                    addr: ctx.address().recipient(),
                });
            }
            ClientEvent::JoinRoom { room } => {
                debug!("join-room signal for {} from {}", room, self.user_id);
                self.hub.do_send(Announce {
                    conn_id: self.conn_id,
                    user_id: self.user_id.clone(),
                    role: None,
                    claimed_at: None,
                    addr: ctx.address().recipient(),
                });
            }
            ClientEvent::UserOnline { role, timestamp, .. } => {
                self.hub.do_send(Announce {
                    conn_id: self.conn_id,
                    user_id: self.user_id.clone(),
                    role,
                    claimed_at: timestamp,
                    addr: ctx.address().recipient(),
                });
            }
            ClientEvent::VideoOffer {
                to,
                caller_name,
                payload,
            } => {
                self.hub.do_send(PlaceCall {
                    caller_id: self.user_id.clone(),
                    caller_name,
                    callee_id: to,
                    payload,
                });
            }
            ClientEvent::AcceptCall { call_id } => {
                self.hub.do_send(AnswerCall {
                    user_id: self.user_id.clone(),
                    call_id,
                    accept: true,
                    reason: None,
                });
            }
            ClientEvent::RejectCall { call_id, reason } => {
                self.hub.do_send(AnswerCall {
                    user_id: self.user_id.clone(),
                    call_id,
                    accept: false,
                    reason,
                });
            }
        }
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
                self.hub.do_send(Heartbeat {
                    conn_id: self.conn_id,
                });
            }
            Ok(ws::Message::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => self.handle_event(event, ctx),
                Err(e) => {
                    debug!("Unparseable WS frame from {}: {}", self.user_id, e);
                    let err = ServerEvent::Error {
                        message: format!("Unrecognized event: {}", e),
                    };
                    ctx.text(serde_json::to_string(&err).unwrap_or_default());
                }
            },
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Err(e) => {
                warn!("WS protocol error for user {}: {}", self.user_id, e);
                ctx.stop();
            }
            _ => {}
        }
    }
}

impl Handler<OutboundEvent> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: OutboundEvent, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.text(serde_json::to_string(&msg.0).unwrap_or_default());
    }
}
