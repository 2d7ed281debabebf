use std::collections::VecDeque;
use std::sync::Mutex;

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;
use bx_api_types::NetworkDescriptor;
use bx_provider::{
    ProviderError, TransactionReceipt, TransactionRequest, WalletProvider,
};

pub(crate) const TEST_ABI: &str = r#"[
  {
    "type": "function",
    "name": "totalBooks",
    "inputs": [],
    "outputs": [{ "name": "", "type": "uint256" }],
    "stateMutability": "view"
  },
  {
    "type": "function",
    "name": "getBook",
    "inputs": [{ "name": "bookId", "type": "string" }],
    "outputs": [
      { "name": "bookId", "type": "string" },
      { "name": "title", "type": "string" },
      { "name": "currentOwner", "type": "address" },
      { "name": "registrationTime", "type": "uint256" }
    ],
    "stateMutability": "view"
  },
  {
    "type": "function",
    "name": "registerBook",
    "inputs": [
      { "name": "bookId", "type": "string" },
      { "name": "title", "type": "string" }
    ],
    "outputs": [],
    "stateMutability": "nonpayable"
  }
]"#;

pub(crate) fn encode_outputs(values: Vec<DynSolValue>) -> Bytes {
    DynSolValue::Tuple(values)
        .abi_encode_sequence()
        .expect("tuple encodes as sequence")
        .into()
}

pub(crate) fn test_account() -> Address {
    "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        .parse()
        .expect("valid test address")
}

/// Scripted in-process provider for session tests.
pub(crate) struct FakeProvider {
    pub accounts: Vec<Address>,
    pub reject_accounts: bool,
    pub signer: bool,
    pub chain: Mutex<u64>,
    pub known_chains: Mutex<Vec<u64>>,
    pub switch_calls: Mutex<Vec<u64>>,
    pub added: Mutex<Vec<NetworkDescriptor>>,
    pub balance: U256,
    /// When set, every gas/nonce prefill lookup fails.
    pub fail_prefill: bool,
    pub send_error: Option<ProviderError>,
    /// Popped front-first on each receipt poll; empty means "not yet mined".
    pub receipts: Mutex<VecDeque<Option<TransactionReceipt>>>,
    /// Popped front-first on each eth_call.
    pub call_script: Mutex<VecDeque<Result<Bytes, ProviderError>>>,
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self {
            accounts: vec![test_account()],
            reject_accounts: false,
            signer: true,
            chain: Mutex::new(31337),
            known_chains: Mutex::new(vec![31337]),
            switch_calls: Mutex::new(Vec::new()),
            added: Mutex::new(Vec::new()),
            balance: U256::from(10).pow(U256::from(18)),
            fail_prefill: false,
            send_error: None,
            receipts: Mutex::new(VecDeque::new()),
            call_script: Mutex::new(VecDeque::new()),
        }
    }
}

impl FakeProvider {
    pub fn tx_hash() -> B256 {
        B256::repeat_byte(0x42)
    }

    pub fn success_receipt() -> TransactionReceipt {
        TransactionReceipt {
            transaction_hash: Self::tx_hash(),
            block_number: Some(U256::from(1)),
            status: Some(U256::from(1)),
        }
    }

    pub fn reverted_receipt() -> TransactionReceipt {
        TransactionReceipt {
            transaction_hash: Self::tx_hash(),
            block_number: Some(U256::from(1)),
            status: Some(U256::ZERO),
        }
    }
}

#[async_trait]
impl WalletProvider for FakeProvider {
    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        if self.reject_accounts {
            return Err(ProviderError::from_rpc(4001, "User rejected the request."));
        }
        Ok(self.accounts.clone())
    }

    async fn chain_id(&self) -> Result<u64, ProviderError> {
        Ok(*self.chain.lock().expect("chain lock"))
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), ProviderError> {
        self.switch_calls.lock().expect("switch lock").push(chain_id);
        if self.known_chains.lock().expect("known lock").contains(&chain_id) {
            *self.chain.lock().expect("chain lock") = chain_id;
            Ok(())
        } else {
            Err(ProviderError::from_rpc(
                4902,
                format!("Unrecognized chain ID {chain_id:#x}"),
            ))
        }
    }

    async fn add_chain(&self, network: &NetworkDescriptor) -> Result<(), ProviderError> {
        self.added.lock().expect("added lock").push(network.clone());
        self.known_chains
            .lock()
            .expect("known lock")
            .push(network.chain_id);
        Ok(())
    }

    async fn balance_of(&self, _address: Address) -> Result<U256, ProviderError> {
        Ok(self.balance)
    }

    async fn gas_price(&self) -> Result<U256, ProviderError> {
        if self.fail_prefill {
            return Err(ProviderError::transport("gas price unavailable"));
        }
        Ok(U256::from(1_000_000_000u64))
    }

    async fn transaction_count(&self, _address: Address) -> Result<u64, ProviderError> {
        if self.fail_prefill {
            return Err(ProviderError::transport("nonce unavailable"));
        }
        Ok(7)
    }

    async fn estimate_gas(&self, _tx: &TransactionRequest) -> Result<U256, ProviderError> {
        if self.fail_prefill {
            return Err(ProviderError::transport("estimation unavailable"));
        }
        Ok(U256::from(100_000u64))
    }

    async fn call(&self, _tx: &TransactionRequest) -> Result<Bytes, ProviderError> {
        self.call_script
            .lock()
            .expect("call lock")
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::transport("unscripted call")))
    }

    async fn send_transaction(&self, _tx: &TransactionRequest) -> Result<B256, ProviderError> {
        match &self.send_error {
            Some(err) => Err(err.clone()),
            None => Ok(Self::tx_hash()),
        }
    }

    async fn transaction_receipt(
        &self,
        _hash: B256,
    ) -> Result<Option<TransactionReceipt>, ProviderError> {
        Ok(self
            .receipts
            .lock()
            .expect("receipts lock")
            .pop_front()
            .unwrap_or_else(|| Some(Self::success_receipt())))
    }

    fn can_sign(&self) -> bool {
        self.signer
    }
}
