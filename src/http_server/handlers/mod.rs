mod error;
pub mod session;
pub mod status;
