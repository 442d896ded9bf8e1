use crate::chains::ChainRegistry;
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use ethers_core::types::{Address, Bytes, H256};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use url::Url;

/// Source of on-chain data required to compare bytecodes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainCodeProvider: Send + Sync {
    /// Code deployed at the address at the latest block.
    async fn deployed_code(&self, chain_id: &str, address: Address) -> anyhow::Result<Bytes>;

    /// Input of the contract creation transaction; `None` if the transaction is unknown.
    async fn creation_input(&self, chain_id: &str, tx_hash: H256)
        -> anyhow::Result<Option<Bytes>>;
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct Transaction {
    input: Bytes,
}

/// Queries chain JSON-RPC nodes, trying the configured urls in order.
pub struct RpcCodeProvider {
    chains: Arc<dyn ChainRegistry>,
    http: reqwest::Client,
}

impl RpcCodeProvider {
    pub fn new(chains: Arc<dyn ChainRegistry>, request_timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self { chains, http })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        chain_id: &str,
        method: &str,
        params: Value,
    ) -> anyhow::Result<Option<T>> {
        let chain = self.chains.resolve(chain_id)?;
        let mut last_error = anyhow!("chain {chain_id} has no rpc urls");
        for url in &chain.rpc_urls {
            match self.call_url(url, method, &params).await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    tracing::warn!(chain_id, url = %url, err = %err, "rpc request failed");
                    last_error = err;
                }
            }
        }
        Err(last_error)
    }

    async fn call_url<T: DeserializeOwned>(
        &self,
        url: &Url,
        method: &str,
        params: &Value,
    ) -> anyhow::Result<Option<T>> {
        let response: RpcResponse<T> = self
            .http
            .post(url.clone())
            .json(&json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": method,
                "params": params,
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("invalid {method} response"))?;
        if let Some(error) = response.error {
            anyhow::bail!("{method} failed with code {}: {}", error.code, error.message);
        }
        Ok(response.result)
    }
}

#[async_trait]
impl ChainCodeProvider for RpcCodeProvider {
    async fn deployed_code(&self, chain_id: &str, address: Address) -> anyhow::Result<Bytes> {
        let code: Option<Bytes> = self
            .call(chain_id, "eth_getCode", json!([address, "latest"]))
            .await?;
        Ok(code.unwrap_or_default())
    }

    async fn creation_input(
        &self,
        chain_id: &str,
        tx_hash: H256,
    ) -> anyhow::Result<Option<Bytes>> {
        let transaction: Option<Transaction> = self
            .call(chain_id, "eth_getTransactionByHash", json!([tx_hash]))
            .await?;
        Ok(transaction.map(|transaction| transaction.input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::{ChainConfig, MockChainRegistry};
    use pretty_assertions::assert_eq;
    use std::str::FromStr;
    use wiremock::{
        matchers::{body_partial_json, method},
        Mock, MockServer, ResponseTemplate,
    };

    fn provider(rpc_urls: Vec<String>) -> RpcCodeProvider {
        let mut chains = MockChainRegistry::new();
        chains.expect_resolve().returning(move |chain_id| {
            Ok(ChainConfig {
                chain_id: chain_id.to_string(),
                name: "Ethereum".to_string(),
                etherscan_api_url: Url::parse("https://api.etherscan.io/api").unwrap(),
                rpc_urls: rpc_urls.iter().map(|url| Url::parse(url).unwrap()).collect(),
            })
        });
        RpcCodeProvider::new(Arc::new(chains), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn falls_back_to_the_next_rpc() {
        let failing = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&failing)
            .await;
        let working = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "eth_getCode" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": "0x6080604052"
            })))
            .mount(&working)
            .await;

        let code = provider(vec![failing.uri(), working.uri()])
            .deployed_code(
                "1",
                Address::from_str("0x5fbdb2315678afecb367f032d93f642f64180aa3").unwrap(),
            )
            .await
            .expect("code is fetched");

        assert_eq!(Bytes::from(vec![0x60, 0x80, 0x60, 0x40, 0x52]), code);
    }

    #[tokio::test]
    async fn unknown_transaction() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(
                json!({ "method": "eth_getTransactionByHash" }),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": null
            })))
            .mount(&server)
            .await;

        let input = provider(vec![server.uri()])
            .creation_input("1", H256::repeat_byte(1))
            .await
            .expect("request succeeds");
        assert_eq!(None, input);
    }

    #[tokio::test]
    async fn rpc_errors_are_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": { "code": -32602, "message": "invalid argument 0" }
            })))
            .mount(&server)
            .await;

        let err = provider(vec![server.uri()])
            .deployed_code("1", Address::zero())
            .await
            .expect_err("rpc error");
        assert!(err.to_string().contains("invalid argument 0"), "{err}");
    }
}
