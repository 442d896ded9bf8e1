mod input;
mod metadata;
mod output;
mod solc;

pub use input::{CompilerInput, Source};
pub use metadata::{Metadata, MetadataSource};
pub use output::{CompiledContract, CompilerOutput, ImmutableReference};
pub use solc::SolcCompiler;

use async_trait::async_trait;
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum Error {
    #[error("compiler version {version} is not supported: {reason}")]
    UnsupportedVersion { version: String, reason: String },
    #[error("compilation error: {0:?}")]
    Compilation(Vec<String>),
    #[error("contract {0} not found in the compiler output")]
    ContractNotFound(String),
    #[error("compiled contract {name} has invalid metadata: {reason}")]
    InvalidMetadata { name: String, reason: String },
    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Compiler: Send + Sync {
    /// Compiles the standard json input with the given solc release.
    ///
    /// Error-severity diagnostics are returned as [`Error::Compilation`].
    async fn compile(&self, version: &str, input: &CompilerInput)
        -> Result<CompilerOutput, Error>;
}

/// Metadata of a single compiled contract together with its raw json,
/// which is what ends up as a `metadata.json` file.
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledMetadata {
    pub raw: String,
    pub metadata: Metadata,
}

#[instrument(skip(compiler, input), level = "debug", err)]
pub async fn compile_metadata(
    compiler: &dyn Compiler,
    version: &str,
    input: &CompilerInput,
    contract_name: &str,
) -> Result<CompiledMetadata, Error> {
    let output = compiler.compile(version, input).await?;
    let (_, contract) = output
        .find_contract(contract_name)
        .ok_or_else(|| Error::ContractNotFound(contract_name.to_string()))?;
    let raw = contract
        .metadata
        .clone()
        .filter(|raw| !raw.is_empty())
        .ok_or_else(|| Error::InvalidMetadata {
            name: contract_name.to_string(),
            reason: "metadata is missing".to_string(),
        })?;
    let metadata = Metadata::from_json(&raw).ok_or_else(|| Error::InvalidMetadata {
        name: contract_name.to_string(),
        reason: "metadata is not a valid solidity metadata".to_string(),
    })?;

    Ok(CompiledMetadata {
        raw,
        metadata,
    })
}
