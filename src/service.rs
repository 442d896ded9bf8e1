use crate::{
    chains::{ChainRegistry, ConfiguredChains},
    compiler::{self, Compiler, SolcCompiler},
    consts::FETCHED_METADATA_DIR,
    etherscan::{EtherscanClient, SourceFetcher},
    metrics,
    session::{PathContent, Session, SessionView, Target},
    settings::Settings,
    storage::{FileSystemStorage, InMemoryStorage, Storage},
    verification::{self, ChainCodeProvider, RpcCodeProvider},
    Error,
};
use ethers_core::types::{Address, H256};
use serde::Deserialize;
use std::{str::FromStr, sync::Arc, time::Duration};
use tracing::instrument;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EtherscanRequest {
    pub chain: String,
    pub address: String,
    pub api_key: String,
}

/// Target requested for an already known contract of the session.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckedContractRequest {
    pub verification_id: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub chain_id: Option<String>,
}

/// Session operations together with the collaborators they depend on.
#[derive(Clone)]
pub struct VerificationService {
    chains: Arc<dyn ChainRegistry>,
    fetcher: Arc<dyn SourceFetcher>,
    compiler: Arc<dyn Compiler>,
    code_provider: Arc<dyn ChainCodeProvider>,
    storage: Arc<dyn Storage>,
    max_session_size: usize,
}

impl VerificationService {
    pub fn new(
        chains: Arc<dyn ChainRegistry>,
        fetcher: Arc<dyn SourceFetcher>,
        compiler: Arc<dyn Compiler>,
        code_provider: Arc<dyn ChainCodeProvider>,
        storage: Arc<dyn Storage>,
        max_session_size: usize,
    ) -> Self {
        Self {
            chains,
            fetcher,
            compiler,
            code_provider,
            storage,
            max_session_size,
        }
    }

    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let chains: Arc<dyn ChainRegistry> =
            Arc::new(ConfiguredChains::new(settings.chains.clone()));
        let fetcher = Arc::new(EtherscanClient::new(&settings.etherscan)?);
        let compiler = Arc::new(SolcCompiler::new(settings.compiler.max_threads));
        let code_provider = Arc::new(RpcCodeProvider::new(
            chains.clone(),
            Duration::from_secs(settings.rpc.request_timeout),
        )?);
        let storage: Arc<dyn Storage> = match &settings.storage.repository_dir {
            Some(dir) => Arc::new(FileSystemStorage::new(dir)),
            None => Arc::new(InMemoryStorage::default()),
        };
        Ok(Self::new(
            chains,
            fetcher,
            compiler,
            code_provider,
            storage,
            settings.session.max_size_bytes,
        ))
    }

    /// Fetches the verified source of the contract from Etherscan, adds the
    /// sources and the compiled metadata to the session, binds the requested
    /// target to every contract without one and verifies whatever became verifiable.
    ///
    /// Stage failures abort the request; files added before the failure stay
    /// in the session.
    #[instrument(skip(self, session, request), fields(chain_id = %request.chain, address = %request.address), err)]
    pub async fn verify_from_etherscan(
        &self,
        session: &mut Session,
        request: &EtherscanRequest,
    ) -> Result<SessionView, Error> {
        let address = self.validate_target(&request.chain, &request.address)?;
        let chain = self.chains.resolve(&request.chain)?;

        let fetched = self
            .fetcher
            .fetch(&chain, address, &request.api_key)
            .await?;
        let source = fetched.source;
        let compiled = compiler::compile_metadata(
            self.compiler.as_ref(),
            &source.compiler_version,
            &source.input,
            &source.contract_name,
        )
        .await?;

        let mut files: Vec<PathContent> = source
            .input
            .source_contents()
            .into_iter()
            .map(|(path, content)| PathContent::new(path, content))
            .collect();
        files.push(PathContent::new(
            format!("{FETCHED_METADATA_DIR}/{}/{address:?}.json", chain.chain_id),
            compiled.raw,
        ));
        self.accumulate(session, files, true)?;

        session.regroup()?;
        let bound = session.bind_unassigned(&Target {
            chain_id: chain.chain_id,
            address,
            creator_tx_hash: fetched.creator_tx_hash,
        });
        tracing::debug!(bound, "target bound to contracts");
        self.classify_and_verify(session).await
    }

    /// Adds caller provided files to the session and regroups its contracts.
    #[instrument(skip_all, fields(files = files.len()), err)]
    pub async fn add_input_files(
        &self,
        session: &mut Session,
        files: Vec<PathContent>,
    ) -> Result<SessionView, Error> {
        self.accumulate(session, files, false)?;
        session.regroup_and_classify()?;
        Ok(SessionView::from(&*session))
    }

    /// Binds the requested targets to known contracts and verifies
    /// every contract that is verifiable afterwards.
    ///
    /// All requests are validated before any of them is applied.
    #[instrument(skip_all, fields(contracts = requests.len()), err)]
    pub async fn verify_checked(
        &self,
        session: &mut Session,
        requests: Vec<CheckedContractRequest>,
    ) -> Result<SessionView, Error> {
        let mut bindings = Vec::with_capacity(requests.len());
        for request in requests {
            let id = H256::from_str(&request.verification_id)
                .ok()
                .filter(|id| session.wrapper(id).is_some())
                .ok_or_else(|| Error::UnknownContract(request.verification_id.clone()))?;
            let target = match (request.chain_id, request.address) {
                (Some(chain_id), Some(address)) => {
                    let address = self.validate_target(&chain_id, &address)?;
                    Some(Target {
                        chain_id,
                        address,
                        creator_tx_hash: None,
                    })
                }
                (None, None) => None,
                _ => {
                    return Err(Error::InvalidAddress(
                        "address and chainId must be provided together".to_string(),
                    ))
                }
            };
            bindings.push((id, target));
        }

        for (id, target) in bindings {
            if let Some(target) = target {
                if session.bind(&id, target) == Some(false) {
                    tracing::debug!(verification_id = ?id, "contract keeps its previous target");
                }
            }
        }
        session.regroup()?;
        self.classify_and_verify(session).await
    }

    fn validate_target(&self, chain_id: &str, address: &str) -> Result<Address, Error> {
        if !self.chains.is_supported_chain(chain_id) {
            return Err(Error::UnsupportedChain(chain_id.to_string()));
        }
        Address::from_str(address).map_err(|_| Error::InvalidAddress(address.to_string()))
    }

    fn accumulate(
        &self,
        session: &mut Session,
        files: Vec<PathContent>,
        require_new: bool,
    ) -> Result<usize, Error> {
        session.check_size(&files, self.max_session_size)?;
        let added = session.accumulate(files);
        metrics::ACCUMULATED_FILES.inc_by(added as u64);
        if added == 0 && require_new {
            return Err(Error::NoNewContent);
        }
        Ok(added)
    }

    async fn classify_and_verify(&self, session: &mut Session) -> Result<SessionView, Error> {
        session.classify();
        verification::verify_session(
            session,
            self.compiler.as_ref(),
            self.code_provider.as_ref(),
            self.storage.as_ref(),
        )
        .await?;
        Ok(SessionView::from(&*session))
    }
}
