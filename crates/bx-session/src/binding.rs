use std::sync::Arc;

use alloy_dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt};
use alloy_json_abi::{Function, JsonAbi};
use alloy_primitives::{Address, Bytes};
use bx_provider::{ProviderError, TransactionRequest, WalletProvider};

/// A deployed contract's address plus parsed ABI. Pure data; performs no
/// I/O of its own.
#[derive(Debug)]
pub struct ContractBinding {
    address: Address,
    abi: JsonAbi,
}

impl ContractBinding {
    /// The only failure modes are a malformed address or malformed ABI.
    pub fn parse(address: &str, abi_json: &str) -> Result<Self, ProviderError> {
        let address = address.parse().map_err(|err| {
            ProviderError::invalid_input(format!("malformed contract address: {err}"))
        })?;
        let abi: JsonAbi = serde_json::from_str(abi_json)
            .map_err(|err| ProviderError::invalid_input(format!("malformed contract ABI: {err}")))?;
        Ok(Self { address, abi })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    fn function(&self, name: &str) -> Result<&Function, ProviderError> {
        self.abi
            .function(name)
            .and_then(|overloads| overloads.first())
            .ok_or_else(|| {
                ProviderError::invalid_input(format!("function {name} not present in ABI"))
            })
    }

    /// Selector-prefixed calldata for `name(args)`.
    pub fn encode_call(
        &self,
        name: &str,
        args: &[DynSolValue],
    ) -> Result<Bytes, ProviderError> {
        let function = self.function(name)?;
        let encoded = function.abi_encode_input(args).map_err(|err| {
            ProviderError::invalid_input(format!("cannot encode call to {name}: {err}"))
        })?;
        Ok(encoded.into())
    }

    pub fn decode_output(
        &self,
        name: &str,
        data: &[u8],
    ) -> Result<Vec<DynSolValue>, ProviderError> {
        let function = self.function(name)?;
        function.abi_decode_output(data, false).map_err(|err| {
            ProviderError::invalid_input(format!("cannot decode return of {name}: {err}"))
        })
    }
}

/// A binding paired with a provider. Read-only and write-capable handles
/// are distinct values; a write through a read-only handle is refused
/// locally, before any RPC.
#[derive(Clone)]
pub struct ContractHandle {
    binding: Arc<ContractBinding>,
    provider: Arc<dyn WalletProvider>,
    writable: bool,
}

impl ContractHandle {
    pub fn read_only(binding: Arc<ContractBinding>, provider: Arc<dyn WalletProvider>) -> Self {
        Self {
            binding,
            provider,
            writable: false,
        }
    }

    pub fn with_signer(
        binding: Arc<ContractBinding>,
        provider: Arc<dyn WalletProvider>,
    ) -> Result<Self, ProviderError> {
        if !provider.can_sign() {
            return Err(ProviderError::not_authorized(
                "cannot build a write-capable handle from a read-only provider",
            ));
        }
        Ok(Self {
            binding,
            provider,
            writable: true,
        })
    }

    pub fn binding(&self) -> &ContractBinding {
        &self.binding
    }

    pub fn provider(&self) -> &Arc<dyn WalletProvider> {
        &self.provider
    }

    pub fn address(&self) -> Address {
        self.binding.address
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Read-only call request against this contract.
    pub fn call_request(
        &self,
        function: &str,
        args: &[DynSolValue],
    ) -> Result<TransactionRequest, ProviderError> {
        let data = self.binding.encode_call(function, args)?;
        Ok(TransactionRequest {
            to: Some(self.binding.address),
            data: Some(data),
            ..Default::default()
        })
    }
}
