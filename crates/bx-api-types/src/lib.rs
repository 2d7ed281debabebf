use serde::{Deserialize, Serialize};

/// Connected wallet account. Lives for the session only; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub address: String,
    /// Native-currency balance as a decimal string, when the lookup succeeded.
    pub balance: Option<String>,
    pub chain_id: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Static description of a supported chain. Never mutated at runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkDescriptor {
    pub chain_id: u64,
    pub name: String,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
    pub block_explorer_url: Option<String>,
}

/// Outcome of one submitted transaction. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionResult {
    pub success: bool,
    pub transaction_hash: Option<String>,
    pub error: Option<String>,
}

impl TransactionResult {
    pub fn confirmed(transaction_hash: String) -> Self {
        Self {
            success: true,
            transaction_hash: Some(transaction_hash),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            transaction_hash: None,
            error: Some(error.into()),
        }
    }

    /// A transaction that made it on-chain but reverted: the hash is real,
    /// the effect is not.
    pub fn reverted(transaction_hash: String, error: impl Into<String>) -> Self {
        Self {
            success: false,
            transaction_hash: Some(transaction_hash),
            error: Some(error.into()),
        }
    }
}

/// One entry of a book's on-chain transfer history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferEvent {
    pub from: String,
    pub to: String,
    pub timestamp: u64,
}

/// View model assembled from contract reads. Rebuilt fresh on every query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookRecord {
    pub book_id: String,
    pub title: String,
    pub current_owner: String,
    pub previous_owners: Vec<String>,
    pub transaction_history: Vec<TransferEvent>,
    pub registered_at: u64,
    pub last_updated: u64,
}

/// Identity of a remote node chain, as reported over the socket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChainInfo {
    pub name: String,
    pub token_symbol: Option<String>,
    pub token_decimals: Option<u8>,
}

/// Node-client connection state. Mutated only by the client's own
/// connect/disconnect/error transitions.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionState {
    pub is_connected: bool,
    pub is_connecting: bool,
    pub account: Option<String>,
    pub chain_info: Option<ChainInfo>,
    pub error: Option<String>,
}

// ── HTTP facade request/response types ───────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletStatusResponse {
    pub connected: bool,
    pub account: Option<Account>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterBookRequest {
    pub book_id: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferBookRequest {
    pub new_owner: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BooksByOwnerResponse {
    pub owner: String,
    pub book_ids: Vec<String>,
}
