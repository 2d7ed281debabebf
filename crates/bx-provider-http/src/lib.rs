use std::sync::atomic::{AtomicU64, Ordering};

use alloy_primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;
use bx_api_types::NetworkDescriptor;
use bx_provider::{
    ErrorKind, ProviderError, TransactionReceipt, TransactionRequest, WalletProvider,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

const METHOD_NOT_FOUND: i64 = -32601;

/// JSON-RPC-over-HTTP wallet provider.
///
/// Talks to a wallet-fronting RPC endpoint (a local node with unlocked
/// accounts, or a wallet proxy exposing the EIP-1193 request surface over
/// HTTP). Reads `BX_RPC_URL` from the environment at construction time
/// (default: `http://localhost:8545`).
pub struct HttpWalletProvider {
    endpoint: String,
    http: reqwest::Client,
    signer_capable: bool,
    next_id: AtomicU64,
}

impl HttpWalletProvider {
    /// Signer-capable provider: the endpoint is trusted to hold accounts
    /// and authorize transactions.
    pub fn new(endpoint: Option<String>) -> Self {
        Self::build(endpoint, true)
    }

    /// Read-only provider: queries are served, writes are refused locally.
    pub fn read_only(endpoint: Option<String>) -> Self {
        Self::build(endpoint, false)
    }

    fn build(endpoint: Option<String>, signer_capable: bool) -> Self {
        let endpoint = endpoint
            .or_else(|| std::env::var("BX_RPC_URL").ok())
            .unwrap_or_else(|| "http://localhost:8545".to_string());
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            signer_capable,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        debug!(method, "rpc request");

        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|err| ProviderError::transport(format!("{method} transport: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::transport(format!(
                "{method} HTTP {status}: {text}"
            )));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::transport(format!("{method} parse: {err}")))?;
        body.into_result()
    }
}

// ── JSON-RPC wire types ──────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    id: u64,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

impl RpcResponse {
    fn into_result(self) -> Result<Value, ProviderError> {
        if let Some(err) = self.error {
            return Err(ProviderError::from_rpc(err.code, err.message));
        }
        self.result
            .ok_or_else(|| ProviderError::transport("rpc response missing result"))
    }
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// `wallet_addEthereumChain` parameter object. Field values are carried
/// verbatim from the network descriptor.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddChainParams<'a> {
    chain_id: String,
    chain_name: &'a str,
    native_currency: AddChainCurrency<'a>,
    rpc_urls: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    block_explorer_urls: Option<Vec<&'a str>>,
}

#[derive(Debug, Serialize)]
struct AddChainCurrency<'a> {
    name: &'a str,
    symbol: &'a str,
    decimals: u8,
}

fn add_chain_params(network: &NetworkDescriptor) -> AddChainParams<'_> {
    AddChainParams {
        chain_id: hex_quantity(network.chain_id),
        chain_name: &network.name,
        native_currency: AddChainCurrency {
            name: &network.native_currency.name,
            symbol: &network.native_currency.symbol,
            decimals: network.native_currency.decimals,
        },
        rpc_urls: &network.rpc_urls,
        block_explorer_urls: network
            .block_explorer_url
            .as_deref()
            .map(|url| vec![url]),
    }
}

// ── quantity helpers ─────────────────────────────────────────────────

fn hex_quantity(value: u64) -> String {
    format!("{value:#x}")
}

fn parse_u256(value: &Value) -> Result<U256, ProviderError> {
    let raw = value
        .as_str()
        .ok_or_else(|| ProviderError::transport("quantity must be a string"))?;
    let parsed = if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        U256::from_str_radix(hex, 16)
    } else {
        U256::from_str_radix(raw, 10)
    };
    parsed.map_err(|err| ProviderError::transport(format!("invalid quantity {raw:?}: {err}")))
}

fn parse_u64(value: &Value) -> Result<u64, ProviderError> {
    let parsed = parse_u256(value)?;
    parsed
        .try_into()
        .map_err(|_| ProviderError::transport("quantity exceeds u64"))
}

fn parse_address(value: &Value) -> Result<Address, ProviderError> {
    let raw = value
        .as_str()
        .ok_or_else(|| ProviderError::transport("address must be a string"))?;
    raw.parse()
        .map_err(|err| ProviderError::invalid_input(format!("invalid account address: {err}")))
}

fn parse_bytes(value: &Value) -> Result<Bytes, ProviderError> {
    let raw = value
        .as_str()
        .ok_or_else(|| ProviderError::transport("call data must be a string"))?;
    raw.parse()
        .map_err(|err| ProviderError::transport(format!("invalid return data: {err}")))
}

fn parse_hash(value: &Value) -> Result<B256, ProviderError> {
    let raw = value
        .as_str()
        .ok_or_else(|| ProviderError::transport("transaction hash must be a string"))?;
    raw.parse()
        .map_err(|err| ProviderError::transport(format!("invalid transaction hash: {err}")))
}

#[async_trait]
impl WalletProvider for HttpWalletProvider {
    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        // Wallet proxies expose eth_requestAccounts; plain nodes only
        // eth_accounts.
        let result = match self.rpc("eth_requestAccounts", json!([])).await {
            Ok(value) => value,
            Err(err) if err.code == Some(METHOD_NOT_FOUND) => {
                self.rpc("eth_accounts", json!([])).await?
            }
            Err(err) if err.kind == ErrorKind::Transport && err.code.is_none() => {
                // HTTP-level failure: nothing is listening where a wallet
                // endpoint should be.
                return Err(ProviderError::provider_unavailable(err.message));
            }
            Err(err) => return Err(err),
        };

        let raw = result
            .as_array()
            .ok_or_else(|| ProviderError::transport("accounts response must be an array"))?;
        let mut accounts = Vec::with_capacity(raw.len());
        for item in raw {
            accounts.push(parse_address(item)?);
        }
        Ok(accounts)
    }

    async fn chain_id(&self) -> Result<u64, ProviderError> {
        let result = self.rpc("eth_chainId", json!([])).await?;
        parse_u64(&result)
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), ProviderError> {
        self.rpc(
            "wallet_switchEthereumChain",
            json!([{ "chainId": hex_quantity(chain_id) }]),
        )
        .await?;
        Ok(())
    }

    async fn add_chain(&self, network: &NetworkDescriptor) -> Result<(), ProviderError> {
        self.rpc(
            "wallet_addEthereumChain",
            json!([add_chain_params(network)]),
        )
        .await?;
        Ok(())
    }

    async fn balance_of(&self, address: Address) -> Result<U256, ProviderError> {
        let result = self
            .rpc("eth_getBalance", json!([address, "latest"]))
            .await?;
        parse_u256(&result)
    }

    async fn gas_price(&self) -> Result<U256, ProviderError> {
        let result = self.rpc("eth_gasPrice", json!([])).await?;
        parse_u256(&result)
    }

    async fn transaction_count(&self, address: Address) -> Result<u64, ProviderError> {
        let result = self
            .rpc("eth_getTransactionCount", json!([address, "pending"]))
            .await?;
        parse_u64(&result)
    }

    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<U256, ProviderError> {
        let result = self.rpc("eth_estimateGas", json!([tx])).await?;
        parse_u256(&result)
    }

    async fn call(&self, tx: &TransactionRequest) -> Result<Bytes, ProviderError> {
        let result = self.rpc("eth_call", json!([tx, "latest"])).await?;
        parse_bytes(&result)
    }

    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<B256, ProviderError> {
        if !self.signer_capable {
            return Err(ProviderError::not_authorized(
                "provider is read-only; no signer available",
            ));
        }
        let result = self.rpc("eth_sendTransaction", json!([tx])).await?;
        parse_hash(&result)
    }

    async fn transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<TransactionReceipt>, ProviderError> {
        let result = self.rpc("eth_getTransactionReceipt", json!([hash])).await?;
        if result.is_null() {
            return Ok(None);
        }
        serde_json::from_value(result)
            .map(Some)
            .map_err(|err| ProviderError::transport(format!("invalid receipt: {err}")))
    }

    fn can_sign(&self) -> bool {
        self.signer_capable
    }

    async fn batch_call(
        &self,
        calls: &[TransactionRequest],
    ) -> Vec<Result<Bytes, ProviderError>> {
        if calls.is_empty() {
            return Vec::new();
        }

        let first_id = self.next_id.fetch_add(calls.len() as u64, Ordering::Relaxed);
        let batch: Vec<RpcRequest<'_>> = calls
            .iter()
            .enumerate()
            .map(|(offset, tx)| RpcRequest {
                jsonrpc: "2.0",
                id: first_id + offset as u64,
                method: "eth_call",
                params: json!([tx, "latest"]),
            })
            .collect();

        let response = match self.http.post(&self.endpoint).json(&batch).send().await {
            Ok(response) => response,
            Err(err) => {
                let shared = ProviderError::transport(format!("batch transport: {err}"));
                return calls.iter().map(|_| Err(shared.clone())).collect();
            }
        };

        let parsed: Result<Vec<RpcResponse>, _> = response.json().await;
        let responses = match parsed {
            Ok(responses) => responses,
            Err(err) => {
                let shared = ProviderError::transport(format!("batch parse: {err}"));
                return calls.iter().map(|_| Err(shared.clone())).collect();
            }
        };

        // Batch responses may arrive in any order; match them back by id.
        let mut slots: Vec<Result<Bytes, ProviderError>> = calls
            .iter()
            .map(|_| Err(ProviderError::transport("missing batch response slot")))
            .collect();
        for item in responses {
            let Some(offset) = item.id.checked_sub(first_id) else {
                continue;
            };
            if let Some(slot) = slots.get_mut(offset as usize) {
                *slot = item.into_result().and_then(|value| parse_bytes(&value));
            }
        }
        slots
    }
}
