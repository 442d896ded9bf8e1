use actix_web::{dev::Server, App, HttpServer};
use actix_web_prom::{PrometheusMetrics, PrometheusMetricsBuilder};
use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};
use std::net::SocketAddr;

lazy_static! {
    pub static ref VERIFICATIONS: IntCounterVec = register_int_counter_vec!(
        "etherscan_session_verifier_verifications",
        "number of contract verifications by outcome",
        &["status"],
    )
    .unwrap();
    pub static ref ACCUMULATED_FILES: IntCounter = register_int_counter!(
        "etherscan_session_verifier_accumulated_files",
        "number of files newly added to sessions",
    )
    .unwrap();
    pub static ref COMPILE_TIME: Histogram = register_histogram!(
        "etherscan_session_verifier_compile_time_seconds",
        "solc compilation time in seconds",
        vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0],
    )
    .unwrap();
}

#[derive(Clone)]
pub struct Metrics {
    metrics_middleware: PrometheusMetrics,
    http_middleware: PrometheusMetrics,
}

impl Metrics {
    pub fn new(endpoint: &str) -> anyhow::Result<Self> {
        let registry = prometheus::default_registry();
        let metrics_middleware = PrometheusMetricsBuilder::new("etherscan_session_verifier_metrics")
            .registry(registry.clone())
            .endpoint(endpoint)
            .build()
            .map_err(|err| anyhow::anyhow!("failed to build metrics middleware: {err}"))?;
        // no endpoint: only collects request metrics of the main server
        let http_middleware = PrometheusMetricsBuilder::new("etherscan_session_verifier")
            .registry(registry.clone())
            .build()
            .map_err(|err| anyhow::anyhow!("failed to build http middleware: {err}"))?;

        Ok(Self {
            metrics_middleware,
            http_middleware,
        })
    }

    pub fn middleware(&self) -> &PrometheusMetrics {
        &self.http_middleware
    }

    pub fn run_server(&self, addr: SocketAddr) -> std::io::Result<Server> {
        let metrics_middleware = self.metrics_middleware.clone();
        Ok(HttpServer::new(move || App::new().wrap(metrics_middleware.clone()))
            .bind(addr)?
            .run())
    }
}
