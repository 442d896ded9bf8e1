pub mod chains;
pub mod compiler;
mod consts;
mod errors;
pub mod etherscan;
mod http_server;
mod metrics;
mod service;
pub mod session;
pub mod settings;
pub mod storage;
mod tracer;
pub mod verification;

pub use consts::SESSION_COOKIE;
pub use errors::Error;
pub use http_server::{configure_router, run as run_http_server, AppRouter, Router};
pub use service::{CheckedContractRequest, EtherscanRequest, VerificationService};
pub use settings::Settings;
pub use tracer::init_logs;
