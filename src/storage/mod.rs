mod filesystem;
mod memory;

pub use filesystem::FileSystemStorage;
pub use memory::InMemoryStorage;

use crate::verification::MatchType;
use async_trait::async_trait;
use ethers_core::types::{Address, Bytes};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
}

/// Successfully verified contract with everything needed to reproduce the verification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedContract {
    pub chain_id: String,
    pub address: Address,
    pub match_type: MatchType,
    pub compiler_version: String,
    pub contract_name: String,
    pub metadata: String,
    pub sources: BTreeMap<String, String>,
    pub constructor_arguments: Option<Bytes>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Storage: Send + Sync {
    async fn persist(&self, contract: &VerifiedContract) -> Result<(), StorageError>;

    /// Match type of the already stored contract, if any.
    async fn find(
        &self,
        chain_id: &str,
        address: Address,
    ) -> Result<Option<MatchType>, StorageError>;
}

/// A full match always wins over a partial one.
fn should_replace(existing: Option<MatchType>, new: MatchType) -> bool {
    !matches!((existing, new), (Some(MatchType::Full), MatchType::Partial))
}
