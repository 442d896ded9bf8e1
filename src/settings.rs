use anyhow::anyhow;
use config::{Config, File};
use serde::{de::IgnoredAny, Deserialize};
use std::{
    collections::BTreeMap, net::SocketAddr, num::NonZeroUsize, path::PathBuf, str::FromStr,
};
use url::Url;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub server: ServerSettings,
    pub metrics: MetricsSettings,
    pub jaeger: JaegerSettings,
    pub chains: ChainsSettings,
    pub etherscan: EtherscanSettings,
    pub rpc: RpcSettings,
    pub compiler: CompilerSettings,
    pub storage: StorageSettings,
    pub session: SessionSettings,

    // Is required as we deny unknown fields, but allow users provide
    // path to config through PREFIX__CONFIG env variable. If removed,
    // the setup would fail with `unknown field `config`, expected one of...`
    #[serde(rename = "config")]
    pub config_path: IgnoredAny,
}

impl PartialEq for Settings {
    fn eq(&self, other: &Self) -> bool {
        self.server == other.server
            && self.metrics == other.metrics
            && self.jaeger == other.jaeger
            && self.chains == other.chains
            && self.etherscan == other.etherscan
            && self.rpc == other.rpc
            && self.compiler == other.compiler
            && self.storage == other.storage
            && self.session == other.session
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from_str("0.0.0.0:8050").expect("should be valid url"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsSettings {
    pub enabled: bool,
    pub addr: SocketAddr,
    pub route: String,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: SocketAddr::from_str("0.0.0.0:6060").expect("should be valid url"),
            route: "/metrics".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JaegerSettings {
    pub enabled: bool,
    pub agent_endpoint: String,
}

impl Default for JaegerSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            agent_endpoint: "localhost:6831".to_string(),
        }
    }
}

/// Chains the service is able to work with, keyed by chain id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ChainsSettings(BTreeMap<String, ChainSettings>);

impl ChainsSettings {
    pub fn inner(&self) -> &BTreeMap<String, ChainSettings> {
        &self.0
    }

    pub fn into_inner(self) -> BTreeMap<String, ChainSettings> {
        self.0
    }

    fn validate(&self) -> anyhow::Result<()> {
        let unnamed: Vec<_> = self
            .0
            .iter()
            .filter(|(_, chain)| chain.name.trim().is_empty())
            .map(|(chain_id, _)| chain_id.as_str())
            .collect();
        if !unnamed.is_empty() {
            anyhow::bail!("chains configuration contains chains without a name: {unnamed:?}");
        }
        Ok(())
    }
}

impl FromIterator<(String, ChainSettings)> for ChainsSettings {
    fn from_iter<T: IntoIterator<Item = (String, ChainSettings)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChainSettings {
    pub name: String,
    pub etherscan_api_url: Option<Url>,
    #[serde(default)]
    pub rpc: Vec<Url>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EtherscanSettings {
    /// Request timeout in seconds.
    pub request_timeout: u64,
    /// Number of retries made on transient failures.
    pub max_retries: u32,
}

impl Default for EtherscanSettings {
    fn default() -> Self {
        Self {
            request_timeout: 10,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RpcSettings {
    /// JSON-RPC request timeout in seconds used when fetching on-chain code.
    pub request_timeout: u64,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            request_timeout: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerSettings {
    /// Maximum number of solc processes running at the same time.
    pub max_threads: NonZeroUsize,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            max_threads: NonZeroUsize::new(4).expect("Is not zero"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSettings {
    /// Repository root for verified contracts.
    /// Verified contracts are kept in memory if not set.
    pub repository_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionSettings {
    /// Idle time in seconds after which a session is dropped.
    pub ttl: u64,
    /// Maximum total size of the files kept in a single session.
    pub max_size_bytes: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl: 3600,
            max_size_bytes: 50 * 1024 * 1024,
        }
    }
}

impl Settings {
    pub fn new() -> anyhow::Result<Self> {
        let config_path = std::env::var("ETHERSCAN_SESSION_VERIFIER__CONFIG");

        let mut builder = Config::builder();
        if let Ok(config_path) = config_path {
            builder = builder.add_source(File::with_name(&config_path));
        };
        // Use `__` so that it would be possible to address keys with underscores in names (e.g. `max_threads`)
        builder = builder.add_source(
            config::Environment::with_prefix("ETHERSCAN_SESSION_VERIFIER").separator("__"),
        );

        let settings: Settings = builder
            .build()?
            .try_deserialize()
            .map_err(|err| anyhow!(err))?;

        settings.validate()?;

        Ok(settings)
    }

    fn validate(&self) -> anyhow::Result<()> {
        self.chains.validate()?;
        if self.session.ttl == 0 {
            anyhow::bail!("session ttl should be positive");
        }
        Ok(())
    }
}
