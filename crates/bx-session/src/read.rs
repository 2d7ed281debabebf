use alloy_dyn_abi::DynSolValue;
use bx_provider::{ProviderError, TransactionRequest};

use crate::binding::ContractHandle;

/// One read-only contract call inside an aggregate query.
#[derive(Debug, Clone)]
pub struct ReadCall {
    pub function: String,
    pub args: Vec<DynSolValue>,
}

impl ReadCall {
    pub fn new(function: impl Into<String>, args: Vec<DynSolValue>) -> Self {
        Self {
            function: function.into(),
            args,
        }
    }
}

pub type ReadOutcome = Result<Vec<DynSolValue>, ProviderError>;

/// Execute several reads against one contract, one result slot per call,
/// order preserved. Collapses into a single batch round trip when the
/// provider supports it. A failing call marks only its own slot; callers
/// must check per-slot status before trusting a value.
pub async fn read_all(handle: &ContractHandle, calls: &[ReadCall]) -> Vec<ReadOutcome> {
    let mut slots: Vec<Option<ReadOutcome>> = calls.iter().map(|_| None).collect();

    // Calls that fail to encode never reach the wire; their slot carries
    // the encoding error.
    let mut requests: Vec<TransactionRequest> = Vec::with_capacity(calls.len());
    let mut wired: Vec<usize> = Vec::with_capacity(calls.len());
    for (index, call) in calls.iter().enumerate() {
        match handle.call_request(&call.function, &call.args) {
            Ok(request) => {
                requests.push(request);
                wired.push(index);
            }
            Err(err) => slots[index] = Some(Err(err)),
        }
    }

    let raw = handle.provider().batch_call(&requests).await;
    for (&index, result) in wired.iter().zip(raw) {
        let call = &calls[index];
        slots[index] = Some(
            result.and_then(|bytes| handle.binding().decode_output(&call.function, &bytes)),
        );
    }

    slots
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| Err(ProviderError::transport("missing batch result slot")))
        })
        .collect()
}
