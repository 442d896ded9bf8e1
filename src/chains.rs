use crate::{
    settings::{ChainSettings, ChainsSettings},
    Error,
};
use std::collections::BTreeMap;
use url::Url;

/// Everything needed to talk to a single chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainConfig {
    pub chain_id: String,
    pub name: String,
    pub etherscan_api_url: Url,
    pub rpc_urls: Vec<Url>,
}

#[cfg_attr(test, mockall::automock)]
pub trait ChainRegistry: Send + Sync {
    fn is_supported_chain(&self, chain_id: &str) -> bool;

    fn resolve(&self, chain_id: &str) -> Result<ChainConfig, Error>;
}

/// Chain registry backed by the service configuration.
///
/// A configured chain is supported only if both an etherscan api
/// and at least one rpc endpoint are known for it.
#[derive(Clone, Debug, Default)]
pub struct ConfiguredChains {
    chains: BTreeMap<String, ChainSettings>,
}

impl ConfiguredChains {
    pub fn new(settings: ChainsSettings) -> Self {
        Self {
            chains: settings.into_inner(),
        }
    }

    fn supported(&self, chain_id: &str) -> Option<ChainConfig> {
        let chain = self.chains.get(chain_id)?;
        let etherscan_api_url = chain.etherscan_api_url.clone()?;
        if chain.rpc.is_empty() {
            return None;
        }
        Some(ChainConfig {
            chain_id: chain_id.to_string(),
            name: chain.name.clone(),
            etherscan_api_url,
            rpc_urls: chain.rpc.clone(),
        })
    }
}

impl ChainRegistry for ConfiguredChains {
    fn is_supported_chain(&self, chain_id: &str) -> bool {
        self.supported(chain_id).is_some()
    }

    fn resolve(&self, chain_id: &str) -> Result<ChainConfig, Error> {
        self.supported(chain_id)
            .ok_or_else(|| Error::UnsupportedChain(chain_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chain(name: &str, etherscan: Option<&str>, rpc: &[&str]) -> ChainSettings {
        ChainSettings {
            name: name.to_string(),
            etherscan_api_url: etherscan.map(|url| Url::parse(url).unwrap()),
            rpc: rpc.iter().map(|url| Url::parse(url).unwrap()).collect(),
        }
    }

    fn registry() -> ConfiguredChains {
        ConfiguredChains::new(ChainsSettings::from_iter([
            (
                "1".to_string(),
                chain(
                    "Ethereum",
                    Some("https://api.etherscan.io/api"),
                    &["https://rpc.ankr.com/eth"],
                ),
            ),
            (
                "5".to_string(),
                chain("Goerli", None, &["https://rpc.ankr.com/eth_goerli"]),
            ),
            (
                "10".to_string(),
                chain("Optimism", Some("https://api-optimistic.etherscan.io/api"), &[]),
            ),
        ]))
    }

    #[test]
    fn resolves_supported_chain() {
        let registry = registry();
        assert!(registry.is_supported_chain("1"));
        let config = registry.resolve("1").expect("supported chain");
        assert_eq!(
            ChainConfig {
                chain_id: "1".into(),
                name: "Ethereum".into(),
                etherscan_api_url: Url::parse("https://api.etherscan.io/api").unwrap(),
                rpc_urls: vec![Url::parse("https://rpc.ankr.com/eth").unwrap()],
            },
            config
        );
    }

    #[test]
    fn incomplete_chains_are_not_supported() {
        let registry = registry();
        for chain_id in ["5", "10", "137"] {
            assert!(!registry.is_supported_chain(chain_id), "chain {chain_id}");
            let err = registry.resolve(chain_id).expect_err("unsupported chain");
            assert!(
                matches!(&err, Error::UnsupportedChain(id) if id == chain_id),
                "{err:?}"
            );
        }
    }
}
