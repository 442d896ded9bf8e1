use super::{should_replace, Storage, StorageError, VerifiedContract};
use crate::verification::MatchType;
use async_trait::async_trait;
use ethers_core::types::Address;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Keeps verified contracts in process memory.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    contracts: RwLock<HashMap<(String, Address), VerifiedContract>>,
}

impl InMemoryStorage {
    pub fn get(&self, chain_id: &str, address: Address) -> Option<VerifiedContract> {
        self.contracts
            .read()
            .get(&(chain_id.to_string(), address))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.contracts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.read().is_empty()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn persist(&self, contract: &VerifiedContract) -> Result<(), StorageError> {
        let mut contracts = self.contracts.write();
        let key = (contract.chain_id.clone(), contract.address);
        let existing = contracts.get(&key).map(|contract| contract.match_type);
        if should_replace(existing, contract.match_type) {
            contracts.insert(key, contract.clone());
        }
        Ok(())
    }

    async fn find(
        &self,
        chain_id: &str,
        address: Address,
    ) -> Result<Option<MatchType>, StorageError> {
        Ok(self
            .get(chain_id, address)
            .map(|contract| contract.match_type))
    }
}
