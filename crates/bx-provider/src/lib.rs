mod error;

use alloy_primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;
use bx_api_types::NetworkDescriptor;
use serde::{Deserialize, Serialize};

pub use error::{ErrorKind, ProviderError, classify_revert};

/// Partial transaction as sent over JSON-RPC. Unset fields are left to the
/// wallet side to fill in.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<U256>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    #[serde(default)]
    pub block_number: Option<U256>,
    /// `0x1` on success, `0x0` on revert. Absent on pre-Byzantium chains.
    #[serde(default)]
    pub status: Option<U256>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        match self.status {
            Some(status) => !status.is_zero(),
            None => true,
        }
    }
}

/// Account-access and transaction surface of a wallet provider, modelled on
/// the EIP-1193 request set. A signer-capable provider can authorize writes;
/// a read-only one serves queries only.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Prompt for (or return previously granted) account access.
    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError>;

    async fn chain_id(&self) -> Result<u64, ProviderError>;

    /// Ask the wallet to activate the given chain. Fails with
    /// [`ErrorKind::UnrecognizedChain`] when the wallet does not know it.
    async fn switch_chain(&self, chain_id: u64) -> Result<(), ProviderError>;

    /// Ask the wallet to add a chain definition (RPC URL, currency,
    /// explorer) so a subsequent switch can succeed.
    async fn add_chain(&self, network: &NetworkDescriptor) -> Result<(), ProviderError>;

    async fn balance_of(&self, address: Address) -> Result<U256, ProviderError>;

    async fn gas_price(&self) -> Result<U256, ProviderError>;

    async fn transaction_count(&self, address: Address) -> Result<u64, ProviderError>;

    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<U256, ProviderError>;

    /// Execute a read-only contract call and return the raw return data.
    async fn call(&self, tx: &TransactionRequest) -> Result<Bytes, ProviderError>;

    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<B256, ProviderError>;

    async fn transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<TransactionReceipt>, ProviderError>;

    /// Whether this provider holds signing capability. Writes through a
    /// provider that does not must be refused locally.
    fn can_sign(&self) -> bool;

    /// Execute several read-only calls, one result slot per call, order
    /// preserved. The default runs them sequentially; providers that can
    /// collapse them into one round trip override this.
    async fn batch_call(
        &self,
        calls: &[TransactionRequest],
    ) -> Vec<Result<Bytes, ProviderError>> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(self.call(call).await);
        }
        results
    }
}
