pub mod handlers;
mod routers;

pub use self::routers::{configure_router, AppRouter, Router};

use crate::{metrics::Metrics, settings::Settings};
use actix_web::{middleware::Condition, App, HttpServer};
use std::sync::Arc;
use tracing_actix_web::TracingLogger;

pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let app_router = Arc::new(AppRouter::new(&settings)?);
    let metrics = Metrics::new(&settings.metrics.route)?;
    let metrics_enabled = settings.metrics.enabled;

    tracing::info!(addr = %settings.server.addr, "etherscan session verifier is starting");
    let server_future = {
        let middleware = metrics.middleware().clone();
        HttpServer::new(move || {
            App::new()
                .wrap(Condition::new(metrics_enabled, middleware.clone()))
                .wrap(TracingLogger::default())
                .configure(configure_router(&*app_router))
        })
        .bind(settings.server.addr)?
        .run()
    };

    let mut futures = vec![tokio::spawn(async move {
        server_future.await.map_err(anyhow::Error::msg)
    })];
    if metrics_enabled {
        let metrics_server = metrics.run_server(settings.metrics.addr)?;
        tracing::info!(addr = %settings.metrics.addr, "metrics server is starting");
        futures.push(tokio::spawn(async move {
            metrics_server.await.map_err(anyhow::Error::msg)
        }));
    }

    let (res, _, others) = futures::future::select_all(futures).await;
    for future in others {
        future.abort()
    }
    res?
}
