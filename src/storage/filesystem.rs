use super::{should_replace, Storage, StorageError, VerifiedContract};
use crate::verification::MatchType;
use async_trait::async_trait;
use ethers_core::{types::Address, utils::to_checksum};
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Repository layout:
/// `{root}/contracts/{full_match|partial_match}/{chain_id}/{address}/`
/// with `metadata.json`, `sources/` and optional `constructor-args.txt`.
#[derive(Clone, Debug)]
pub struct FileSystemStorage {
    root: PathBuf,
}

impl FileSystemStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn contract_dir(&self, match_type: MatchType, chain_id: &str, address: Address) -> PathBuf {
        let match_dir = match match_type {
            MatchType::Full => "full_match",
            MatchType::Partial => "partial_match",
        };
        self.root
            .join("contracts")
            .join(match_dir)
            .join(chain_id)
            .join(to_checksum(&address, None))
    }

    async fn write_contract(
        &self,
        dir: &Path,
        contract: &VerifiedContract,
    ) -> Result<(), StorageError> {
        if fs::try_exists(dir).await? {
            fs::remove_dir_all(dir).await?;
        }
        fs::create_dir_all(dir).await?;
        fs::write(dir.join("metadata.json"), &contract.metadata).await?;
        for (path, content) in &contract.sources {
            let file_path = dir.join("sources").join(sanitize(path));
            if let Some(parent) = file_path.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::write(file_path, content).await?;
        }
        if let Some(arguments) = &contract.constructor_arguments {
            fs::write(dir.join("constructor-args.txt"), arguments.to_string()).await?;
        }
        Ok(())
    }
}

/// Keeps source paths inside the contract directory.
fn sanitize(path: &str) -> PathBuf {
    Path::new(path)
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect()
}

#[async_trait]
impl Storage for FileSystemStorage {
    async fn persist(&self, contract: &VerifiedContract) -> Result<(), StorageError> {
        let existing = self.find(&contract.chain_id, contract.address).await?;
        if !should_replace(existing, contract.match_type) {
            return Ok(());
        }

        let dir = self.contract_dir(contract.match_type, &contract.chain_id, contract.address);
        self.write_contract(&dir, contract).await?;

        if contract.match_type == MatchType::Full {
            let partial =
                self.contract_dir(MatchType::Partial, &contract.chain_id, contract.address);
            if fs::try_exists(&partial).await? {
                fs::remove_dir_all(partial).await?;
            }
        }
        Ok(())
    }

    async fn find(
        &self,
        chain_id: &str,
        address: Address,
    ) -> Result<Option<MatchType>, StorageError> {
        for match_type in [MatchType::Full, MatchType::Partial] {
            let metadata = self
                .contract_dir(match_type, chain_id, address)
                .join("metadata.json");
            if fs::try_exists(metadata).await? {
                return Ok(Some(match_type));
            }
        }
        Ok(None)
    }
}
