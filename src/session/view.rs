use super::{ContractWrapper, Session, WrapperStatus};
use crate::verification::MatchType;
use ethers_core::utils::to_checksum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Session state as returned to the caller.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    pub contracts: BTreeMap<String, ContractView>,
    pub unused: Vec<String>,
    pub files: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractView {
    pub verification_id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_type: Option<MatchType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
    pub name: String,
    pub compiled_path: String,
    pub compiler_version: String,
    pub files: ContractFilesView,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractFilesView {
    pub found: Vec<String>,
    pub missing: Vec<String>,
    pub invalid: Vec<String>,
}

impl From<&ContractWrapper> for ContractView {
    fn from(wrapper: &ContractWrapper) -> Self {
        let (match_type, status_message) = match wrapper.status() {
            WrapperStatus::Verified {
                match_type,
                message,
            } => (Some(*match_type), message.clone()),
            WrapperStatus::VerificationFailed { reason } => (None, Some(reason.to_string())),
            WrapperStatus::Unverified | WrapperStatus::Verifiable => (None, None),
        };
        let sources = wrapper.sources();
        Self {
            verification_id: format!("{:?}", wrapper.id()),
            status: wrapper.status().as_str().to_string(),
            status_message,
            match_type,
            address: wrapper
                .target()
                .map(|target| to_checksum(&target.address, None)),
            chain_id: wrapper.target().map(|target| target.chain_id.clone()),
            name: wrapper.name().to_string(),
            compiled_path: wrapper.compiled_path().to_string(),
            compiler_version: wrapper.metadata().compiler.version.clone(),
            files: ContractFilesView {
                found: sources.found.keys().cloned().collect(),
                missing: sources.missing.keys().cloned().collect(),
                invalid: sources.invalid.keys().cloned().collect(),
            },
        }
    }
}

impl From<&Session> for SessionView {
    fn from(session: &Session) -> Self {
        Self {
            contracts: session
                .wrappers()
                .map(|wrapper| (format!("{:?}", wrapper.id()), wrapper.into()))
                .collect(),
            unused: session.unused_files(),
            files: session.files().iter().map(|file| file.path.clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        compiler::Metadata,
        session::{content_hash, PathContent, Target},
        verification::{FailureReason, VerificationOutcome, WrapperOutcome},
    };
    use ethers_core::types::Address;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::str::FromStr;

    const A: &str = "contract A {}";

    fn metadata() -> String {
        json!({
            "compiler": { "version": "0.8.17+commit.8df45f5f" },
            "language": "Solidity",
            "settings": { "compilationTarget": { "A.sol": "A" } },
            "sources": {
                "A.sol": { "keccak256": content_hash(A) },
                "B.sol": { "keccak256": content_hash("contract B {}") }
            }
        })
        .to_string()
    }

    #[test]
    fn session_is_presented() {
        let raw = metadata();
        assert!(Metadata::from_json(&raw).is_some());
        let mut session = Session::default();
        session.accumulate([
            PathContent::new("A.sol", A),
            PathContent::new("metadata.json", raw.clone()),
            PathContent::new("README.md", "# readme"),
        ]);
        session.regroup_and_classify().unwrap();
        session.bind_unassigned(&Target {
            chain_id: "100".to_string(),
            address: Address::from_str("0x5fbdb2315678afecb367f032d93f642f64180aa3").unwrap(),
            creator_tx_hash: None,
        });
        session
            .apply_outcomes(vec![WrapperOutcome {
                id: content_hash(&raw),
                outcome: VerificationOutcome::Failed(FailureReason::NoDeployedCode),
            }])
            .unwrap();

        let view = serde_json::to_value(SessionView::from(&session)).unwrap();

        let id = format!("{:?}", content_hash(&raw));
        assert_eq!(
            json!({
                "contracts": {
                    id.clone(): {
                        "verificationId": id,
                        "status": "verification-failed",
                        "statusMessage": "no contract code is deployed at the address",
                        "address": "0x5FbDB2315678afecb367f032d93F642f64180aa3",
                        "chainId": "100",
                        "name": "A",
                        "compiledPath": "A.sol",
                        "compilerVersion": "0.8.17+commit.8df45f5f",
                        "files": { "found": ["A.sol"], "missing": ["B.sol"], "invalid": [] }
                    }
                },
                "unused": ["README.md"],
                "files": ["A.sol", "README.md", "metadata.json"]
            }),
            view
        );
    }
}
