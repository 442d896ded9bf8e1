use super::Router;
use crate::{
    http_server::handlers::session::{self, SessionState},
    service::VerificationService,
    session::SessionStore,
    settings::SessionSettings,
};
use actix_web::web;
use std::time::Duration;

pub struct SessionRouter {
    state: web::Data<SessionState>,
    json_config: web::JsonConfig,
}

impl SessionRouter {
    pub fn new(service: VerificationService, settings: &SessionSettings) -> Self {
        let state = SessionState {
            store: SessionStore::new(Duration::from_secs(settings.ttl)),
            service,
        };
        Self {
            state: web::Data::new(state),
            json_config: web::JsonConfig::default().limit(settings.max_size_bytes),
        }
    }
}

impl Router for SessionRouter {
    fn register_routes(&self, service_config: &mut web::ServiceConfig) {
        service_config
            .app_data(self.state.clone())
            .app_data(self.json_config.clone())
            .route(
                "/verify/etherscan",
                web::post().to(session::verify_from_etherscan),
            )
            .route("/verify-checked", web::post().to(session::verify_checked))
            .route("/input-files", web::post().to(session::add_input_files))
            .route("/data", web::get().to(session::data));
    }
}
