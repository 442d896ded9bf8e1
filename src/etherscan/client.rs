use super::{
    types::{ContractCreationRecord, EtherscanResponse, SourceCodeRecord},
    ContractSource, FetchError, FetchedContract, SourceFetcher,
};
use crate::{chains::ChainConfig, settings::EtherscanSettings};
use anyhow::anyhow;
use async_trait::async_trait;
use ethers_core::types::{Address, H256};
use reqwest::StatusCode;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::{str::FromStr, time::Duration};
use tracing::instrument;
use url::Url;

/// Etherscan (and etherscan compatible explorers) `contract` module api client.
#[derive(Clone)]
pub struct EtherscanClient {
    http: ClientWithMiddleware,
}

impl EtherscanClient {
    pub fn new(settings: &EtherscanSettings) -> anyhow::Result<Self> {
        let retry_policy =
            ExponentialBackoff::builder().build_with_max_retries(settings.max_retries);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout))
            .build()?;
        let http = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();
        Ok(Self { http })
    }

    pub async fn source_code(
        &self,
        api_url: &Url,
        address: Address,
        api_key: &str,
    ) -> Result<ContractSource, FetchError> {
        let address = format!("{address:?}");
        let result = self
            .request(
                api_url,
                &[
                    ("module", "contract"),
                    ("action", "getsourcecode"),
                    ("address", &address),
                    ("apikey", api_key),
                ],
            )
            .await?;
        let record = first_record::<SourceCodeRecord>(result)?.ok_or(FetchError::NotVerified)?;
        record.into_contract_source()
    }

    pub async fn creator_tx_hash(
        &self,
        api_url: &Url,
        address: Address,
        api_key: &str,
    ) -> Result<Option<H256>, FetchError> {
        let address = format!("{address:?}");
        let result = self
            .request(
                api_url,
                &[
                    ("module", "contract"),
                    ("action", "getcontractcreation"),
                    ("contractaddresses", &address),
                    ("apikey", api_key),
                ],
            )
            .await?;
        let hash = first_record::<ContractCreationRecord>(result)?
            .map(|record| H256::from_str(&record.tx_hash))
            .transpose()
            .map_err(|err| FetchError::InvalidResponse(anyhow!("invalid tx hash: {err}")))?;
        Ok(hash)
    }

    async fn request(&self, api_url: &Url, query: &[(&str, &str)]) -> Result<Value, FetchError> {
        let response = self.http.get(api_url.clone()).query(query).send().await?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(FetchError::RateLimited(response.text().await?));
            }
            status_code => {
                return Err(FetchError::Upstream(format!(
                    "unexpected status code {status_code}: {}",
                    response.text().await?
                )));
            }
        }

        let response: EtherscanResponse = response
            .json()
            .await
            .map_err(|err| FetchError::InvalidResponse(anyhow!(err)))?;
        response.into_result()
    }
}

fn first_record<T: DeserializeOwned>(result: Value) -> Result<Option<T>, FetchError> {
    let records: Vec<T> =
        serde_json::from_value(result).map_err(|err| FetchError::InvalidResponse(anyhow!(err)))?;
    Ok(records.into_iter().next())
}

#[async_trait]
impl SourceFetcher for EtherscanClient {
    #[instrument(skip(self, chain, api_key), fields(chain_id = %chain.chain_id), err)]
    async fn fetch(
        &self,
        chain: &ChainConfig,
        address: Address,
        api_key: &str,
    ) -> Result<FetchedContract, FetchError> {
        let source = self
            .source_code(&chain.etherscan_api_url, address, api_key)
            .await?;
        let creator_tx_hash = self
            .creator_tx_hash(&chain.etherscan_api_url, address, api_key)
            .await
            .unwrap_or_else(|err| {
                tracing::warn!(err = %err, "creation transaction lookup failed");
                None
            });
        Ok(FetchedContract {
            source,
            creator_tx_hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::{
        matchers::{method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    const ADDRESS: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";
    const TX_HASH: &str = "0x6e2ef7d5e5b5f8e1c1cbd2bb4b0b0de4fb4fb6a64d3c4e1f07c0f6bf6cd2c0a1";

    fn client() -> EtherscanClient {
        EtherscanClient::new(&EtherscanSettings {
            request_timeout: 5,
            max_retries: 0,
        })
        .unwrap()
    }

    fn chain(server: &MockServer) -> ChainConfig {
        ChainConfig {
            chain_id: "1".to_string(),
            name: "Ethereum".to_string(),
            etherscan_api_url: Url::parse(&format!("{}/api", server.uri())).unwrap(),
            rpc_urls: vec![Url::parse("http://localhost:8545").unwrap()],
        }
    }

    async fn mock_action(server: &MockServer, action: &str, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path("/api"))
            .and(query_param("module", "contract"))
            .and(query_param("action", action))
            .and(query_param("apikey", "key"))
            .respond_with(response)
            .mount(server)
            .await;
    }

    fn source_code_response() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "status": "1",
            "message": "OK",
            "result": [{
                "SourceCode": "contract Storage {}",
                "ABI": "[]",
                "ContractName": "Storage",
                "CompilerVersion": "v0.8.17+commit.8df45f5f",
                "OptimizationUsed": "0",
                "Runs": "200",
                "ConstructorArguments": "",
                "EVMVersion": "Default",
                "Library": "",
                "LicenseType": "MIT",
                "Proxy": "0",
                "Implementation": "",
                "SwarmSource": ""
            }]
        }))
    }

    #[tokio::test]
    async fn fetches_source_and_creation_tx() {
        let server = MockServer::start().await;
        mock_action(&server, "getsourcecode", source_code_response()).await;
        mock_action(
            &server,
            "getcontractcreation",
            ResponseTemplate::new(200).set_body_json(json!({
                "status": "1",
                "message": "OK",
                "result": [{
                    "contractAddress": ADDRESS,
                    "contractCreator": "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
                    "txHash": TX_HASH
                }]
            })),
        )
        .await;

        let fetched = client()
            .fetch(&chain(&server), Address::from_str(ADDRESS).unwrap(), "key")
            .await
            .expect("fetch succeeds");

        assert_eq!("Storage", fetched.source.contract_name);
        assert_eq!("0.8.17+commit.8df45f5f", fetched.source.compiler_version);
        assert_eq!(Some(H256::from_str(TX_HASH).unwrap()), fetched.creator_tx_hash);
    }

    #[tokio::test]
    async fn creation_tx_lookup_failure_is_ignored() {
        let server = MockServer::start().await;
        mock_action(&server, "getsourcecode", source_code_response()).await;
        mock_action(&server, "getcontractcreation", ResponseTemplate::new(500)).await;

        let fetched = client()
            .fetch(&chain(&server), Address::from_str(ADDRESS).unwrap(), "key")
            .await
            .expect("fetch succeeds");
        assert_eq!(None, fetched.creator_tx_hash);
    }

    #[tokio::test]
    async fn unverified_contract() {
        let server = MockServer::start().await;
        mock_action(
            &server,
            "getsourcecode",
            ResponseTemplate::new(200).set_body_json(json!({
                "status": "1",
                "message": "OK",
                "result": [{ "SourceCode": "", "ContractName": "", "CompilerVersion": "" }]
            })),
        )
        .await;

        let err = client()
            .fetch(&chain(&server), Address::from_str(ADDRESS).unwrap(), "key")
            .await
            .expect_err("contract is not verified");
        assert!(matches!(err, FetchError::NotVerified), "{err:?}");
    }

    #[tokio::test]
    async fn rate_limited() {
        let server = MockServer::start().await;
        mock_action(
            &server,
            "getsourcecode",
            ResponseTemplate::new(200).set_body_json(json!({
                "status": "0",
                "message": "NOTOK",
                "result": "Max rate limit reached, please use API Key for higher rate limit"
            })),
        )
        .await;

        let err = client()
            .fetch(&chain(&server), Address::from_str(ADDRESS).unwrap(), "key")
            .await
            .expect_err("rate limited");
        assert!(matches!(err, FetchError::RateLimited(_)), "{err:?}");
    }

    #[tokio::test]
    async fn too_many_requests_status() {
        let server = MockServer::start().await;
        mock_action(
            &server,
            "getsourcecode",
            ResponseTemplate::new(429).set_body_string("slow down"),
        )
        .await;

        let err = client()
            .fetch(&chain(&server), Address::from_str(ADDRESS).unwrap(), "key")
            .await
            .expect_err("rate limited");
        assert!(matches!(err, FetchError::RateLimited(msg) if msg == "slow down"));
    }
}
