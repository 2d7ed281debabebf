use std::time::Duration;

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{Address, U256};
use bx_api_types::TransactionResult;
use bx_provider::TransactionRequest;
use tracing::warn;

use crate::binding::ContractHandle;

/// Confirmation-poll tuning. The defaults allow two minutes on a
/// half-second cadence before giving up on a confirmation.
#[derive(Debug, Clone)]
pub struct SubmitOptions {
    pub poll_interval: Duration,
    pub max_polls: u32,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            max_polls: 240,
        }
    }
}

/// Issue a contract write and wait for one confirmation.
///
/// All failures are folded into the returned [`TransactionResult`]; this
/// never returns an error and never retries. A failed submission must be
/// re-initiated by the caller.
pub async fn submit(
    handle: &ContractHandle,
    from: Address,
    function: &str,
    args: &[DynSolValue],
) -> TransactionResult {
    submit_with(handle, from, function, args, SubmitOptions::default()).await
}

pub async fn submit_with(
    handle: &ContractHandle,
    from: Address,
    function: &str,
    args: &[DynSolValue],
    options: SubmitOptions,
) -> TransactionResult {
    if !handle.is_writable() {
        return TransactionResult::failed(
            "write attempted through a read-only handle; no signer available",
        );
    }

    let data = match handle.binding().encode_call(function, args) {
        Ok(data) => data,
        Err(err) => return TransactionResult::failed(err.message),
    };

    let provider = handle.provider();
    let mut tx = TransactionRequest {
        from: Some(from),
        to: Some(handle.address()),
        data: Some(data),
        ..Default::default()
    };

    // Best-effort prefill. Each lookup may fail on its own; the wallet side
    // estimates whatever is left unset.
    match provider.gas_price().await {
        Ok(price) => tx.gas_price = Some(price),
        Err(err) => warn!(function, "gas price lookup failed: {err}"),
    }
    match provider.transaction_count(from).await {
        Ok(nonce) => tx.nonce = Some(U256::from(nonce)),
        Err(err) => warn!(function, "nonce lookup failed: {err}"),
    }
    match provider.estimate_gas(&tx).await {
        Ok(gas) => tx.gas = Some(gas),
        Err(err) => warn!(function, "gas estimation failed: {err}"),
    }

    let hash = match provider.send_transaction(&tx).await {
        Ok(hash) => hash,
        Err(err) => {
            return TransactionResult::failed(format!("{function} failed: {}", err.message));
        }
    };
    let hash_text = hash.to_string();

    for _ in 0..options.max_polls {
        match provider.transaction_receipt(hash).await {
            Ok(Some(receipt)) => {
                return if receipt.succeeded() {
                    TransactionResult::confirmed(hash_text)
                } else {
                    TransactionResult::reverted(hash_text, "transaction reverted on-chain")
                };
            }
            Ok(None) => {}
            Err(err) => {
                // Transient lookup failures are tolerated; the transaction
                // is already in flight.
                warn!(function, "receipt lookup failed: {err}");
            }
        }
        tokio::time::sleep(options.poll_interval).await;
    }

    TransactionResult {
        success: false,
        transaction_hash: Some(hash_text),
        error: Some("confirmation timed out; the transaction may still be mined".to_owned()),
    }
}
