use crate::settings::JaegerSettings;
use opentelemetry::{
    global,
    sdk::{propagation::TraceContextPropagator, trace::Tracer},
    trace::TraceError,
};
use tracing_subscriber::{filter::LevelFilter, layer::SubscriberExt, prelude::*, EnvFilter};

const SERVICE_NAME: &str = "etherscan_session_verifier";

/// Installs the global subscriber: stdout logs filtered by `RUST_LOG`
/// (INFO when unset) and, if enabled, spans exported to the jaeger agent.
pub fn init_logs(jaeger: JaegerSettings) -> anyhow::Result<()> {
    let stdout_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    let stdout = tracing_subscriber::fmt::layer().with_filter(stdout_filter);
    let registry = tracing_subscriber::registry().with(stdout);

    let result = if jaeger.enabled {
        let tracer = jaeger_tracer(&jaeger.agent_endpoint)?;
        let spans = tracing_opentelemetry::layer()
            .with_tracer(tracer)
            .with_filter(LevelFilter::DEBUG);
        registry.with(spans).try_init()
    } else {
        registry.try_init()
    };
    result.map_err(|err| anyhow::anyhow!("installing the tracing subscriber failed: {err}"))
}

fn jaeger_tracer(agent_endpoint: &str) -> Result<Tracer, TraceError> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    opentelemetry_jaeger::new_agent_pipeline()
        .with_service_name(SERVICE_NAME)
        .with_endpoint(agent_endpoint)
        .with_auto_split_batch(true)
        .install_batch(opentelemetry::runtime::Tokio)
}
