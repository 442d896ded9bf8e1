use super::{configure_router, Router, SessionRouter};
use crate::{http_server::handlers::status, service::VerificationService, settings::Settings};
use actix_web::web;

pub struct AppRouter {
    session: SessionRouter,
}

impl AppRouter {
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let service = VerificationService::from_settings(settings)?;
        Ok(Self::with_service(service, settings))
    }

    pub fn with_service(service: VerificationService, settings: &Settings) -> Self {
        Self {
            session: SessionRouter::new(service, &settings.session),
        }
    }
}

impl Router for AppRouter {
    fn register_routes(&self, service_config: &mut web::ServiceConfig) {
        service_config
            .route("/health", web::get().to(status::status))
            .service(web::scope("/session").configure(configure_router(&self.session)));
    }
}
