mod client;
mod types;

pub use client::EtherscanClient;
pub use types::{ContractSource, SourceCodeRecord};

use crate::chains::ChainConfig;
use async_trait::async_trait;
use ethers_core::types::{Address, H256};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("etherscan rate limit reached: {0}")]
    RateLimited(String),
    #[error("contract is not verified on Etherscan")]
    NotVerified,
    #[error("only solidity contracts are supported, got {0}")]
    UnsupportedLanguage(String),
    #[error("etherscan request failed: {0}")]
    Upstream(String),
    #[error("invalid etherscan response: {0:#}")]
    InvalidResponse(anyhow::Error),
}

impl From<reqwest_middleware::Error> for FetchError {
    fn from(err: reqwest_middleware::Error) -> Self {
        FetchError::Upstream(err.to_string())
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Upstream(err.to_string())
    }
}

/// Verified source of a contract as returned by the block explorer.
#[derive(Clone, Debug, PartialEq)]
pub struct FetchedContract {
    pub source: ContractSource,
    /// Hash of the transaction that created the contract, if known.
    pub creator_tx_hash: Option<H256>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(
        &self,
        chain: &ChainConfig,
        address: Address,
        api_key: &str,
    ) -> Result<FetchedContract, FetchError>;
}
