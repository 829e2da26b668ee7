use crate::config::Config;
use crate::db::MongoDB;
use crate::hub::NotificationHub;
use actix::Addr;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub hub: Addr<NotificationHub>,
    pub mongodb: Arc<MongoDB>,
    pub config: Config,
}
