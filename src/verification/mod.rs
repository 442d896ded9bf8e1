mod bytecode;
mod chain_client;

pub use bytecode::{compare, strip_cbor_auxdata, BytecodeMatch, CompiledBytecode};
pub use chain_client::{ChainCodeProvider, RpcCodeProvider};

#[cfg(test)]
pub use chain_client::MockChainCodeProvider;

use crate::{
    compiler::{self, Compiler, CompilerInput},
    metrics,
    session::{Session, Target},
    storage::{Storage, VerifiedContract},
    Error,
};
use ethers_core::types::H256;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::instrument;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Full,
    Partial,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Full => "full",
            MatchType::Partial => "partial",
        }
    }
}

/// Why a contract could not be verified against its target.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum FailureReason {
    #[error("no contract code is deployed at the address")]
    NoDeployedCode,
    #[error("the deployed and recompiled bytecode don't match")]
    BytecodeMismatch,
    #[error("immutable references don't fit the deployed bytecode")]
    ImmutableReferencesMismatch,
    #[error("constructor arguments don't match the contract constructor")]
    ConstructorArgumentsMismatch,
    #[error("recompilation failed: {0}")]
    CompilationFailed(String),
    #[error("{0}")]
    Internal(String),
}

impl FailureReason {
    /// Failures caused by the environment rather than by the contract,
    /// so a later attempt may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, FailureReason::Internal(_))
    }
}

/// Everything needed to verify a single contract, detached from the session.
#[derive(Clone, Debug, PartialEq)]
pub struct VerificationJob {
    pub id: H256,
    pub compiler_version: String,
    pub input: CompilerInput,
    pub contract_path: String,
    pub contract_name: String,
    pub metadata_raw: String,
    pub sources: BTreeMap<String, String>,
    pub target: Target,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerificationOutcome {
    Verified {
        match_type: MatchType,
        message: Option<String>,
    },
    Failed(FailureReason),
}

impl VerificationOutcome {
    fn status_label(&self) -> &'static str {
        match self {
            VerificationOutcome::Verified {
                match_type: MatchType::Full,
                ..
            } => "full",
            VerificationOutcome::Verified {
                match_type: MatchType::Partial,
                ..
            } => "partial",
            VerificationOutcome::Failed(_) => "failed",
        }
    }
}

/// Outcome of a single contract, addressed by its verification id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WrapperOutcome {
    pub id: H256,
    pub outcome: VerificationOutcome,
}

/// Verifies every job independently. A failure of one job
/// never affects the others; all of them are awaited before returning.
pub async fn verify(
    jobs: Vec<VerificationJob>,
    compiler: &dyn Compiler,
    code_provider: &dyn ChainCodeProvider,
    storage: &dyn Storage,
) -> Vec<WrapperOutcome> {
    let verifications = jobs
        .into_iter()
        .map(|job| verify_job(job, compiler, code_provider, storage));
    futures::future::join_all(verifications).await
}

/// Verifies all verifiable contracts of the session and stores the outcomes in it.
pub async fn verify_session(
    session: &mut Session,
    compiler: &dyn Compiler,
    code_provider: &dyn ChainCodeProvider,
    storage: &dyn Storage,
) -> Result<(), Error> {
    let jobs = session.verification_jobs();
    if jobs.is_empty() {
        return Ok(());
    }
    let outcomes = verify(jobs, compiler, code_provider, storage).await;
    session.apply_outcomes(outcomes)
}

#[instrument(
    skip_all,
    fields(
        verification_id = ?job.id,
        chain_id = %job.target.chain_id,
        address = ?job.target.address,
    )
)]
async fn verify_job(
    job: VerificationJob,
    compiler: &dyn Compiler,
    code_provider: &dyn ChainCodeProvider,
    storage: &dyn Storage,
) -> WrapperOutcome {
    let outcome = process_job(&job, compiler, code_provider, storage).await;
    match &outcome {
        VerificationOutcome::Verified { match_type, .. } => {
            tracing::info!(match_type = match_type.as_str(), "contract verified")
        }
        VerificationOutcome::Failed(reason) => {
            tracing::info!(reason = %reason, "contract verification failed")
        }
    }
    metrics::VERIFICATIONS
        .with_label_values(&[outcome.status_label()])
        .inc();
    WrapperOutcome {
        id: job.id,
        outcome,
    }
}

async fn process_job(
    job: &VerificationJob,
    compiler: &dyn Compiler,
    code_provider: &dyn ChainCodeProvider,
    storage: &dyn Storage,
) -> VerificationOutcome {
    let target = &job.target;
    match storage.find(&target.chain_id, target.address).await {
        Ok(Some(match_type)) => {
            return VerificationOutcome::Verified {
                match_type,
                message: Some("contract is already verified".to_string()),
            }
        }
        Ok(None) => {}
        Err(err) => tracing::warn!(err = %err, "looking up verified contracts failed"),
    }

    let deployed_code = match code_provider
        .deployed_code(&target.chain_id, target.address)
        .await
    {
        Ok(code) if code.0.is_empty() => {
            return VerificationOutcome::Failed(FailureReason::NoDeployedCode)
        }
        Ok(code) => code,
        Err(err) => {
            return VerificationOutcome::Failed(FailureReason::Internal(format!(
                "fetching deployed code failed: {err:#}"
            )))
        }
    };

    let output = match compiler.compile(&job.compiler_version, &job.input).await {
        Ok(output) => output,
        Err(
            err @ (compiler::Error::Compilation(_) | compiler::Error::UnsupportedVersion { .. }),
        ) => {
            return VerificationOutcome::Failed(FailureReason::CompilationFailed(err.to_string()))
        }
        Err(err) => {
            return VerificationOutcome::Failed(FailureReason::Internal(format!(
                "compiler failed: {err}"
            )))
        }
    };
    let compiled = match output
        .contract(&job.contract_path, &job.contract_name)
        .ok_or_else(|| {
            FailureReason::Internal(format!(
                "contract {} not found in the compiler output",
                job.contract_name
            ))
        })
        .and_then(CompiledBytecode::try_from)
    {
        Ok(compiled) => compiled,
        Err(reason) => return VerificationOutcome::Failed(reason),
    };

    let creation_input = match target.creator_tx_hash {
        Some(tx_hash) => code_provider
            .creation_input(&target.chain_id, tx_hash)
            .await
            .unwrap_or_else(|err| {
                tracing::warn!(err = %err, "fetching creation transaction failed");
                None
            }),
        None => None,
    };

    let bytecode_match = match compare(
        &compiled,
        &deployed_code.0[..],
        creation_input.as_ref().map(|input| &input.0[..]),
    ) {
        Ok(bytecode_match) => bytecode_match,
        Err(reason) => return VerificationOutcome::Failed(reason),
    };

    let contract = verified_contract(job, &bytecode_match);
    let message = match storage.persist(&contract).await {
        Ok(()) => None,
        Err(err) => {
            tracing::error!(err = %err, "storing verified contract failed");
            Some(format!("contract is verified but could not be stored: {err}"))
        }
    };
    VerificationOutcome::Verified {
        match_type: bytecode_match.match_type,
        message,
    }
}

fn verified_contract(job: &VerificationJob, bytecode_match: &BytecodeMatch) -> VerifiedContract {
    VerifiedContract {
        chain_id: job.target.chain_id.clone(),
        address: job.target.address,
        match_type: bytecode_match.match_type,
        compiler_version: job.compiler_version.clone(),
        contract_name: job.contract_name.clone(),
        metadata: job.metadata_raw.clone(),
        sources: job.sources.clone(),
        constructor_arguments: bytecode_match.constructor_arguments.clone(),
    }
}
