use thiserror::Error;

/// Structured failure categories for every wallet/provider operation.
///
/// Numeric EIP-1193 / JSON-RPC codes map here at the call layer, so nothing
/// above the provider matches on error-message wording for control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No injected wallet / provider endpoint is available.
    ProviderUnavailable,
    /// The user declined a wallet prompt (EIP-1193 code 4001).
    UserRejected,
    /// The active chain differs from the target and could not be
    /// switched or added.
    NetworkMismatch,
    /// The wallet knows nothing about the requested chain (code 4902);
    /// an add-chain request may fix it.
    UnrecognizedChain,
    /// Write attempted without a signer, or an on-chain permission revert.
    NotAuthorized,
    AlreadyExists,
    NotFound,
    InvalidInput,
    /// Another exclusive operation (e.g. a connect flow) is in flight.
    Busy,
    /// Every endpoint failed, or the reconnect attempt cap was reached.
    ConnectionExhausted,
    /// Network / RPC transport failure not otherwise classified.
    Transport,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ProviderError {
    pub kind: ErrorKind,
    pub message: String,
    /// Raw JSON-RPC error code, when the failure came from an RPC error
    /// object rather than the transport.
    pub code: Option<i64>,
}

impl ProviderError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
        }
    }

    pub fn provider_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProviderUnavailable, message)
    }

    pub fn user_rejected() -> Self {
        Self::new(ErrorKind::UserRejected, "request rejected by user")
    }

    pub fn not_authorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotAuthorized, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn busy(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Busy, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    /// Build an error from a JSON-RPC error object. Known wallet codes map
    /// to their structured kind; everything else falls back to the revert
    /// classifier on the message text.
    pub fn from_rpc(code: i64, message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = match code {
            4001 => ErrorKind::UserRejected,
            4100 => ErrorKind::NotAuthorized,
            4900 | 4901 => ErrorKind::ProviderUnavailable,
            4902 => ErrorKind::UnrecognizedChain,
            _ => classify_revert(&message),
        };
        Self {
            kind,
            message,
            code: Some(code),
        }
    }
}

/// Heuristic mapping from revert-message text to an error category.
///
/// This is the single place revert wording is inspected; callers branch on
/// [`ErrorKind`], never on substrings.
pub fn classify_revert(message: &str) -> ErrorKind {
    let lower = message.to_ascii_lowercase();
    if lower.contains("rejected by user")
        || lower.contains("user rejected")
        || lower.contains("user denied")
    {
        ErrorKind::UserRejected
    } else if lower.contains("already exists") || lower.contains("already registered") {
        ErrorKind::AlreadyExists
    } else if lower.contains("not found") || lower.contains("does not exist") {
        ErrorKind::NotFound
    } else if lower.contains("not owner")
        || lower.contains("not the owner")
        || lower.contains("not authorized")
        || lower.contains("caller is not")
    {
        ErrorKind::NotAuthorized
    } else if lower.contains("invalid") {
        ErrorKind::InvalidInput
    } else {
        ErrorKind::Transport
    }
}
