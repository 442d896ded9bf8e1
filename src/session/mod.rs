pub mod classifier;
mod files;
mod store;
mod view;
mod wrappers;

pub use files::{content_hash, file_id, PathContent, SessionFile, SessionFiles};
pub use store::SessionStore;
pub use view::{ContractFilesView, ContractView, SessionView};
pub use wrappers::{
    CheckedSources, ContractWrapper, InvalidSource, Target, TargetBinding, WrapperStatus,
};

use crate::{
    compiler::Metadata,
    verification::{VerificationJob, WrapperOutcome},
    Error,
};
use ethers_core::types::H256;
use mismatch::Mismatch;
use std::collections::{BTreeMap, BTreeSet};
use tracing::instrument;

/// Files and contracts accumulated on behalf of a single caller.
#[derive(Clone, Debug, Default)]
pub struct Session {
    files: SessionFiles,
    wrappers: BTreeMap<H256, ContractWrapper>,
}

impl Session {
    pub fn files(&self) -> &SessionFiles {
        &self.files
    }

    pub fn wrappers(&self) -> impl Iterator<Item = &ContractWrapper> {
        self.wrappers.values()
    }

    pub fn wrapper(&self, id: &H256) -> Option<&ContractWrapper> {
        self.wrappers.get(id)
    }

    /// Rejects the batch if the session would grow above `max_size` bytes.
    pub fn check_size(&self, batch: &[PathContent], max_size: usize) -> Result<(), Error> {
        let size = self.files.size_with(batch);
        if size > max_size {
            return Err(Error::PayloadTooLarge(Mismatch::new(max_size, size)));
        }
        Ok(())
    }

    /// Returns the number of newly added files.
    pub fn accumulate(&mut self, batch: impl IntoIterator<Item = PathContent>) -> usize {
        self.files.accumulate(batch)
    }

    /// Derives contracts from the metadata files of the session and matches
    /// their sources against the current file set.
    ///
    /// Contracts are never removed: a contract stays even if its metadata
    /// file has been replaced since.
    #[instrument(skip_all, level = "debug")]
    pub fn regroup(&mut self) -> Result<(), Error> {
        for file in self.files.iter() {
            let Some(metadata) = Metadata::from_json(&file.content) else {
                continue;
            };
            match self.wrappers.get(&file.content_hash) {
                Some(existing) if existing.metadata_raw() != file.content => {
                    return Err(Error::RegistryInconsistency(format!(
                        "contract {:?} is registered with another metadata",
                        file.content_hash
                    )));
                }
                Some(_) => {}
                None => {
                    if let Some(wrapper) = ContractWrapper::new(file.content.clone(), metadata) {
                        self.wrappers.insert(wrapper.id(), wrapper);
                    }
                }
            }
        }

        for wrapper in self.wrappers.values_mut() {
            wrapper.update_sources(&self.files);
        }
        Ok(())
    }

    /// Binds the target to every contract which has none yet.
    /// Returns the number of contracts bound.
    pub fn bind_unassigned(&mut self, target: &Target) -> usize {
        let mut bound = 0;
        for wrapper in self.wrappers.values_mut() {
            if wrapper.bind_target(target.clone()) {
                bound += 1;
            }
        }
        bound
    }

    /// Binds the target to the given contract unless it already has one.
    pub fn bind(&mut self, id: &H256, target: Target) -> Option<bool> {
        self.wrappers
            .get_mut(id)
            .map(|wrapper| wrapper.bind_target(target))
    }

    pub fn classify(&mut self) {
        for wrapper in self.wrappers.values_mut() {
            wrapper.classify();
        }
    }

    pub fn regroup_and_classify(&mut self) -> Result<(), Error> {
        self.regroup()?;
        self.classify();
        Ok(())
    }

    pub fn verification_jobs(&self) -> Vec<VerificationJob> {
        self.wrappers
            .values()
            .filter_map(ContractWrapper::verification_job)
            .collect()
    }

    /// Stores verification outcomes in the corresponding contracts.
    ///
    /// Outcomes of known contracts are applied even if some other outcome
    /// refers to an unknown one; the latter is reported as an error.
    pub fn apply_outcomes(&mut self, outcomes: Vec<WrapperOutcome>) -> Result<(), Error> {
        let mut unknown = Vec::new();
        for WrapperOutcome { id, outcome } in outcomes {
            match self.wrappers.get_mut(&id) {
                Some(wrapper) => wrapper.apply_outcome(outcome),
                None => unknown.push(id),
            }
        }
        if !unknown.is_empty() {
            return Err(Error::RegistryInconsistency(format!(
                "verification outcomes refer to unknown contracts: {unknown:?}"
            )));
        }
        Ok(())
    }

    /// Paths of files that are neither a contract metadata nor a found source.
    pub fn unused_files(&self) -> Vec<String> {
        let used: BTreeSet<H256> = self
            .wrappers
            .values()
            .flat_map(|wrapper| {
                wrapper
                    .sources()
                    .found
                    .values()
                    .map(|content| content_hash(content))
                    .chain([wrapper.id()])
            })
            .collect();
        self.files
            .iter()
            .filter(|file| !used.contains(&file.content_hash))
            .map(|file| file.path.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verification::{FailureReason, MatchType, VerificationOutcome};
    use ethers_core::types::Address;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const A: &str = "contract A {}";
    const LIB: &str = "library Lib {}";

    fn metadata(target: &str, sources: &[&str]) -> String {
        let sources: serde_json::Map<_, _> = sources
            .iter()
            .map(|content| {
                let path = format!("{}.sol", content.split_whitespace().nth(1).unwrap());
                (path, json!({ "keccak256": content_hash(content) }))
            })
            .collect();
        let target_path = format!("{target}.sol");
        json!({
            "compiler": { "version": "0.8.17+commit.8df45f5f" },
            "language": "Solidity",
            "output": { "abi": [] },
            "settings": { "compilationTarget": { target_path: target } },
            "sources": sources,
            "version": 1
        })
        .to_string()
    }

    fn target(address: u8) -> Target {
        Target {
            chain_id: "1".to_string(),
            address: Address::repeat_byte(address),
            creator_tx_hash: None,
        }
    }

    #[test]
    fn metadata_groups_previously_accumulated_sources() {
        let mut session = Session::default();
        session.accumulate([PathContent::new("A.sol", A), PathContent::new("Lib.sol", LIB)]);
        session.regroup().unwrap();
        assert_eq!(0, session.wrappers().count());
        assert_eq!(vec!["A.sol", "Lib.sol"], session.unused_files());

        let raw = metadata("A", &[A, LIB]);
        session.accumulate([PathContent::new("metadata.json", raw.clone())]);
        session.regroup().unwrap();

        let wrapper = session.wrapper(&content_hash(&raw)).expect("contract is derived");
        assert_eq!("A", wrapper.name());
        assert!(wrapper.sources().is_complete());
        assert!(session.unused_files().is_empty());
    }

    #[test]
    fn regroup_is_idempotent() {
        let mut session = Session::default();
        session.accumulate([
            PathContent::new("A.sol", A),
            PathContent::new("metadata.json", metadata("A", &[A, LIB])),
        ]);
        session.regroup_and_classify().unwrap();
        let before: Vec<_> = session.wrappers().cloned().collect();

        session.regroup_and_classify().unwrap();

        assert_eq!(before, session.wrappers().cloned().collect::<Vec<_>>());
    }

    #[test]
    fn contracts_survive_metadata_replacement() {
        let mut session = Session::default();
        let first = metadata("A", &[A]);
        session.accumulate([PathContent::new("metadata.json", first.clone())]);
        session.regroup().unwrap();

        session.accumulate([PathContent::new("metadata.json", metadata("Lib", &[LIB]))]);
        session.regroup().unwrap();

        assert_eq!(2, session.wrappers().count());
        assert!(session.wrapper(&content_hash(&first)).is_some());
    }

    #[test]
    fn first_target_wins() {
        let mut session = Session::default();
        session.accumulate([
            PathContent::new("A.sol", A),
            PathContent::new("metadata.json", metadata("A", &[A])),
        ]);
        session.regroup().unwrap();

        assert_eq!(1, session.bind_unassigned(&target(0xaa)));
        assert_eq!(0, session.bind_unassigned(&target(0xbb)));
        session.classify();

        let wrapper = session.wrappers().next().unwrap();
        assert_eq!(Address::repeat_byte(0xaa), wrapper.target().unwrap().address);
        assert_eq!(&WrapperStatus::Verifiable, wrapper.status());
        assert_eq!(Some(false), session.bind(&wrapper.id(), target(0xcc)));
        assert_eq!(None, session.bind(&H256::zero(), target(0xcc)));
    }

    #[test]
    fn verifiable_contract_stays_verifiable() {
        let mut session = Session::default();
        let a = metadata("A", &[A]);
        session.accumulate([
            PathContent::new("A.sol", A),
            PathContent::new("a.json", a.clone()),
        ]);
        session.regroup().unwrap();
        session.bind_unassigned(&target(0xaa));
        session.classify();
        let before = session.wrapper(&content_hash(&a)).cloned().unwrap();
        assert_eq!(&WrapperStatus::Verifiable, before.status());

        session.accumulate([
            PathContent::new("README.md", "# A"),
            PathContent::new("lib.json", metadata("Lib", &[LIB])),
        ]);
        session.regroup_and_classify().unwrap();
        session.bind_unassigned(&target(0xbb));
        session.regroup_and_classify().unwrap();

        assert_eq!(2, session.wrappers().count());
        assert_eq!(Some(&before), session.wrapper(&content_hash(&a)));
    }

    #[test]
    fn outcomes_are_applied_per_contract() {
        let mut session = Session::default();
        let a = metadata("A", &[A]);
        let lib = metadata("Lib", &[LIB]);
        session.accumulate([
            PathContent::new("A.sol", A),
            PathContent::new("Lib.sol", LIB),
            PathContent::new("a.json", a.clone()),
            PathContent::new("lib.json", lib.clone()),
        ]);
        session.regroup().unwrap();
        session.bind_unassigned(&target(0xaa));
        session.classify();
        assert_eq!(2, session.verification_jobs().len());

        let err = session
            .apply_outcomes(vec![
                WrapperOutcome {
                    id: content_hash(&a),
                    outcome: VerificationOutcome::Verified {
                        match_type: MatchType::Full,
                        message: None,
                    },
                },
                WrapperOutcome {
                    id: content_hash(&lib),
                    outcome: VerificationOutcome::Failed(FailureReason::BytecodeMismatch),
                },
                WrapperOutcome {
                    id: H256::zero(),
                    outcome: VerificationOutcome::Failed(FailureReason::NoDeployedCode),
                },
            ])
            .expect_err("unknown contract");

        assert!(matches!(err, Error::RegistryInconsistency(_)));
        let status = |raw: &str| session.wrapper(&content_hash(raw)).unwrap().status().as_str();
        assert_eq!("verified", status(&a));
        assert_eq!("verification-failed", status(&lib));
        assert!(session.verification_jobs().is_empty());
    }

    #[test]
    fn size_limit() {
        let session = Session::default();
        let err = session
            .check_size(&[PathContent::new("A.sol", A)], 5)
            .expect_err("too large");
        assert_eq!(
            "session size limit exceeded: Expected 5, found 13",
            err.to_string()
        );
        session
            .check_size(&[PathContent::new("A.sol", A)], 13)
            .expect("fits");
    }
}
