use super::{
    classifier,
    files::{content_hash, SessionFiles},
};
use crate::{
    compiler::{Metadata, MetadataSource},
    verification::{FailureReason, MatchType, VerificationJob, VerificationOutcome},
};
use ethers_core::types::{Address, H256};
use std::collections::BTreeMap;

/// On-chain location a contract is expected to be deployed at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub chain_id: String,
    pub address: Address,
    pub creator_tx_hash: Option<H256>,
}

/// Single-assignment slot for the contract target.
///
/// Once bound, the target can be neither replaced nor reset.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TargetBinding(Option<Target>);

impl TargetBinding {
    /// Binds the target if nothing is bound yet. Returns whether the binding happened.
    pub fn bind(&mut self, target: Target) -> bool {
        if self.0.is_some() {
            return false;
        }
        self.0 = Some(target);
        true
    }

    pub fn get(&self) -> Option<&Target> {
        self.0.as_ref()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WrapperStatus {
    Unverified,
    Verifiable,
    Verified {
        match_type: MatchType,
        message: Option<String>,
    },
    VerificationFailed {
        reason: FailureReason,
    },
}

impl WrapperStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WrapperStatus::Unverified => "unverified",
            WrapperStatus::Verifiable => "verifiable",
            WrapperStatus::Verified { .. } => "verified",
            WrapperStatus::VerificationFailed { .. } => "verification-failed",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvalidSource {
    pub expected_hash: H256,
    pub found_hash: H256,
}

/// Sources referenced by the metadata matched against the session files.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckedSources {
    pub found: BTreeMap<String, String>,
    pub missing: BTreeMap<String, MetadataSource>,
    pub invalid: BTreeMap<String, InvalidSource>,
}

impl CheckedSources {
    /// A source is found when some session file (or the inline metadata content)
    /// hashes to the recorded keccak256, regardless of its path. A file at the
    /// expected path with another hash makes the source invalid.
    pub fn check(metadata: &Metadata, files: &SessionFiles) -> Self {
        let by_hash: BTreeMap<H256, &str> = files
            .iter()
            .map(|file| (file.content_hash, file.content.as_str()))
            .collect();

        let mut checked = CheckedSources::default();
        for (path, source) in &metadata.sources {
            let inline = source
                .content
                .as_deref()
                .filter(|content| content_hash(content) == source.keccak256);
            if let Some(content) = by_hash.get(&source.keccak256).copied().or(inline) {
                checked.found.insert(path.clone(), content.to_string());
            } else if let Some(file) = files.get(path) {
                checked.invalid.insert(
                    path.clone(),
                    InvalidSource {
                        expected_hash: source.keccak256,
                        found_hash: file.content_hash,
                    },
                );
            } else {
                checked.missing.insert(path.clone(), source.clone());
            }
        }
        checked
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.invalid.is_empty()
    }
}

/// Candidate contract inside a session, derived from a metadata file.
#[derive(Clone, Debug, PartialEq)]
pub struct ContractWrapper {
    id: H256,
    metadata_raw: String,
    metadata: Metadata,
    compiled_path: String,
    name: String,
    sources: CheckedSources,
    target: TargetBinding,
    status: WrapperStatus,
}

impl ContractWrapper {
    /// Returns `None` for metadata without a single compilation target.
    pub fn new(metadata_raw: String, metadata: Metadata) -> Option<Self> {
        let (compiled_path, name) = metadata.compilation_target()?;
        let (compiled_path, name) = (compiled_path.to_string(), name.to_string());
        Some(Self {
            id: content_hash(&metadata_raw),
            metadata_raw,
            metadata,
            compiled_path,
            name,
            sources: CheckedSources::default(),
            target: TargetBinding::default(),
            status: WrapperStatus::Unverified,
        })
    }

    pub fn id(&self) -> H256 {
        self.id
    }

    pub fn metadata_raw(&self) -> &str {
        &self.metadata_raw
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn compiled_path(&self) -> &str {
        &self.compiled_path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sources(&self) -> &CheckedSources {
        &self.sources
    }

    pub fn target(&self) -> Option<&Target> {
        self.target.get()
    }

    pub fn status(&self) -> &WrapperStatus {
        &self.status
    }

    /// First assignment wins, later targets are ignored.
    pub fn bind_target(&mut self, target: Target) -> bool {
        self.target.bind(target)
    }

    pub(super) fn update_sources(&mut self, files: &SessionFiles) {
        let checked = CheckedSources::check(&self.metadata, files);
        if checked.found != self.sources.found
            && matches!(self.status, WrapperStatus::VerificationFailed { .. })
        {
            self.status = WrapperStatus::Unverified;
        }
        self.sources = checked;
    }

    /// Verified contracts and contracts that failed for a reason of their own
    /// keep their status; the rest become verifiable as soon as the
    /// classifier allows.
    pub(super) fn classify(&mut self) {
        let open = match &self.status {
            WrapperStatus::Unverified | WrapperStatus::Verifiable => true,
            WrapperStatus::VerificationFailed { reason } => reason.is_transient(),
            WrapperStatus::Verified { .. } => false,
        };
        if open {
            self.status = if classifier::is_verifiable(self) {
                WrapperStatus::Verifiable
            } else {
                WrapperStatus::Unverified
            };
        }
    }

    pub(super) fn verification_job(&self) -> Option<VerificationJob> {
        if self.status != WrapperStatus::Verifiable {
            return None;
        }
        let target = self.target.get()?.clone();
        Some(VerificationJob {
            id: self.id,
            compiler_version: self.metadata.compiler.version.clone(),
            input: self.metadata.compiler_input(self.sources.found.clone()),
            contract_path: self.compiled_path.clone(),
            contract_name: self.name.clone(),
            metadata_raw: self.metadata_raw.clone(),
            sources: self.sources.found.clone(),
            target,
        })
    }

    pub(super) fn apply_outcome(&mut self, outcome: VerificationOutcome) {
        self.status = match outcome {
            VerificationOutcome::Verified {
                match_type,
                message,
            } => WrapperStatus::Verified {
                match_type,
                message,
            },
            VerificationOutcome::Failed(reason) => WrapperStatus::VerificationFailed { reason },
        };
    }
}
