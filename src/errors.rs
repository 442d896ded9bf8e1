use crate::{compiler, etherscan::FetchError};
use mismatch::Mismatch;
use thiserror::Error;

/// Request level failure of a session operation.
///
/// Per-contract verification results are never reported through this type;
/// they are stored in the session and returned inside the session view.
#[derive(Error, Debug)]
pub enum Error {
    #[error("chain_id={0}; is not supported")]
    UnsupportedChain(String),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("The contract didn't add any new file")]
    NoNewContent,
    #[error("unknown verification id: {0}")]
    UnknownContract(String),
    #[error(transparent)]
    Compiler(#[from] compiler::Error),
    #[error("session size limit exceeded: {0}")]
    PayloadTooLarge(Mismatch<usize>),
    #[error("contract registry is inconsistent: {0}")]
    RegistryInconsistency(String),
    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
}

impl Error {
    /// Errors caused by the caller input (as opposed to upstream or internal failures).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedChain(_)
                | Error::InvalidAddress(_)
                | Error::NoNewContent
                | Error::UnknownContract(_)
                | Error::PayloadTooLarge(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn error_messages() {
        assert_eq!(
            "chain_id=77; is not supported",
            Error::UnsupportedChain("77".into()).to_string()
        );
        assert_eq!(
            "The contract didn't add any new file",
            Error::NoNewContent.to_string()
        );
        assert_eq!(
            "session size limit exceeded: Expected 10, found 12",
            Error::PayloadTooLarge(Mismatch::new(10, 12)).to_string()
        );
    }

    #[test]
    fn client_errors() {
        assert!(Error::InvalidAddress("0x".into()).is_client_error());
        assert!(Error::NoNewContent.is_client_error());
        assert!(!Error::Fetch(FetchError::NotVerified).is_client_error());
        assert!(!Error::RegistryInconsistency("unknown id".into()).is_client_error());
    }
}
