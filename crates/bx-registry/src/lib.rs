use std::sync::Arc;

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{Address, U256};
use bx_api_types::{BookRecord, TransactionResult, TransferEvent};
use bx_provider::{ProviderError, WalletProvider};
use bx_session::{ContractBinding, ContractHandle, ReadCall, read_all, submit};

/// ABI of the deployed book registry, consumed as static JSON.
pub const BOOK_REGISTRY_ABI: &str = r#"[
  {
    "type": "function",
    "name": "registerBook",
    "inputs": [
      { "name": "bookId", "type": "string" },
      { "name": "title", "type": "string" }
    ],
    "outputs": [],
    "stateMutability": "nonpayable"
  },
  {
    "type": "function",
    "name": "transferOwnership",
    "inputs": [
      { "name": "bookId", "type": "string" },
      { "name": "newOwner", "type": "address" }
    ],
    "outputs": [],
    "stateMutability": "nonpayable"
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
    "name": "getTransferHistory",
    "inputs": [{ "name": "bookId", "type": "string" }],
    "outputs": [
      {
        "name": "",
        "type": "tuple[]",
        "components": [
          { "name": "from", "type": "address" },
          { "name": "to", "type": "address" },
          { "name": "timestamp", "type": "uint256" }
        ]
      }
    ],
    "stateMutability": "view"
  },
  {
    "type": "function",
    "name": "verifyOwnership",
    "inputs": [
      { "name": "bookId", "type": "string" },
      { "name": "claimant", "type": "address" }
    ],
    "outputs": [{ "name": "", "type": "bool" }],
    "stateMutability": "view"
  },
  {
    "type": "function",
    "name": "getBooksByOwner",
    "inputs": [{ "name": "owner", "type": "address" }],
    "outputs": [{ "name": "", "type": "string[]" }],
    "stateMutability": "view"
  },
  {
    "type": "function",
    "name": "totalBooks",
    "inputs": [],
    "outputs": [{ "name": "", "type": "uint256" }],
    "stateMutability": "view"
  }
]"#;

/// On-chain book summary as returned by `getBook`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookSummary {
    pub book_id: String,
    pub title: String,
    pub current_owner: Address,
    pub registered_at: u64,
}

/// Typed client for the book registry contract.
pub struct BookRegistry {
    handle: ContractHandle,
}

impl std::fmt::Debug for BookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookRegistry")
            .field("address", &self.handle.address())
            .finish_non_exhaustive()
    }
}

impl BookRegistry {
    pub fn read_only(
        address: &str,
        provider: Arc<dyn WalletProvider>,
    ) -> Result<Self, ProviderError> {
        let binding = Arc::new(ContractBinding::parse(address, BOOK_REGISTRY_ABI)?);
        Ok(Self {
            handle: ContractHandle::read_only(binding, provider),
        })
    }

    pub fn with_signer(
        address: &str,
        provider: Arc<dyn WalletProvider>,
    ) -> Result<Self, ProviderError> {
        let binding = Arc::new(ContractBinding::parse(address, BOOK_REGISTRY_ABI)?);
        Ok(Self {
            handle: ContractHandle::with_signer(binding, provider)?,
        })
    }

    pub fn from_handle(handle: ContractHandle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &ContractHandle {
        &self.handle
    }

    // ── writes ───────────────────────────────────────────────────────

    pub async fn register_book(
        &self,
        from: Address,
        book_id: &str,
        title: &str,
    ) -> TransactionResult {
        submit(
            &self.handle,
            from,
            "registerBook",
            &[
                DynSolValue::String(book_id.to_owned()),
                DynSolValue::String(title.to_owned()),
            ],
        )
        .await
    }

    pub async fn transfer_ownership(
        &self,
        from: Address,
        book_id: &str,
        new_owner: Address,
    ) -> TransactionResult {
        submit(
            &self.handle,
            from,
            "transferOwnership",
            &[
                DynSolValue::String(book_id.to_owned()),
                DynSolValue::Address(new_owner),
            ],
        )
        .await
    }

    // ── reads ────────────────────────────────────────────────────────

    pub async fn get_book(&self, book_id: &str) -> Result<BookSummary, ProviderError> {
        let request = self
            .handle
            .call_request("getBook", &[DynSolValue::String(book_id.to_owned())])?;
        let raw = self.handle.provider().call(&request).await?;
        let values = self.handle.binding().decode_output("getBook", &raw)?;
        decode_book_summary(&values)
    }

    pub async fn transfer_history(
        &self,
        book_id: &str,
    ) -> Result<Vec<TransferEvent>, ProviderError> {
        let request = self.handle.call_request(
            "getTransferHistory",
            &[DynSolValue::String(book_id.to_owned())],
        )?;
        let raw = self.handle.provider().call(&request).await?;
        let values = self
            .handle
            .binding()
            .decode_output("getTransferHistory", &raw)?;
        decode_transfer_history(&values)
    }

    pub async fn verify_ownership(
        &self,
        book_id: &str,
        claimant: Address,
    ) -> Result<bool, ProviderError> {
        let request = self.handle.call_request(
            "verifyOwnership",
            &[
                DynSolValue::String(book_id.to_owned()),
                DynSolValue::Address(claimant),
            ],
        )?;
        let raw = self.handle.provider().call(&request).await?;
        let values = self
            .handle
            .binding()
            .decode_output("verifyOwnership", &raw)?;
        single(&values)?
            .as_bool()
            .ok_or_else(|| unexpected_shape("verifyOwnership"))
    }

    pub async fn books_by_owner(&self, owner: Address) -> Result<Vec<String>, ProviderError> {
        let request = self
            .handle
            .call_request("getBooksByOwner", &[DynSolValue::Address(owner)])?;
        let raw = self.handle.provider().call(&request).await?;
        let values = self
            .handle
            .binding()
            .decode_output("getBooksByOwner", &raw)?;
        let items = single(&values)?
            .as_array()
            .ok_or_else(|| unexpected_shape("getBooksByOwner"))?;
        items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_owned)
                    .ok_or_else(|| unexpected_shape("getBooksByOwner"))
            })
            .collect()
    }

    pub async fn total_books(&self) -> Result<u64, ProviderError> {
        let request = self.handle.call_request("totalBooks", &[])?;
        let raw = self.handle.provider().call(&request).await?;
        let values = self.handle.binding().decode_output("totalBooks", &raw)?;
        let (value, _) = single(&values)?
            .as_uint()
            .ok_or_else(|| unexpected_shape("totalBooks"))?;
        uint_to_u64(value, "totalBooks")
    }

    /// Assemble the full view model from one batched round trip of
    /// `getBook` + `getTransferHistory`. Rebuilt fresh on every query.
    pub async fn book_record(&self, book_id: &str) -> Result<BookRecord, ProviderError> {
        let calls = [
            ReadCall::new("getBook", vec![DynSolValue::String(book_id.to_owned())]),
            ReadCall::new(
                "getTransferHistory",
                vec![DynSolValue::String(book_id.to_owned())],
            ),
        ];
        let mut outcomes = read_all(&self.handle, &calls).await.into_iter();

        let summary_values = outcomes
            .next()
            .unwrap_or_else(|| Err(ProviderError::transport("missing getBook slot")))?;
        let history_values = outcomes
            .next()
            .unwrap_or_else(|| Err(ProviderError::transport("missing history slot")))?;

        let summary = decode_book_summary(&summary_values)?;
        let history = decode_transfer_history(&history_values)?;

        let previous_owners: Vec<String> = history
            .iter()
            .filter(|event| event.from != Address::ZERO.to_string())
            .map(|event| event.from.clone())
            .collect();
        let last_updated = history
            .last()
            .map(|event| event.timestamp)
            .unwrap_or(summary.registered_at);

        Ok(BookRecord {
            book_id: summary.book_id,
            title: summary.title,
            current_owner: summary.current_owner.to_string(),
            previous_owners,
            transaction_history: history,
            registered_at: summary.registered_at,
            last_updated,
        })
    }
}

// ── decoding helpers ─────────────────────────────────────────────────

fn single<'a>(values: &'a [DynSolValue]) -> Result<&'a DynSolValue, ProviderError> {
    match values {
        [value] => Ok(value),
        _ => Err(ProviderError::invalid_input(
            "unexpected return arity from contract call",
        )),
    }
}

fn unexpected_shape(function: &str) -> ProviderError {
    ProviderError::invalid_input(format!("unexpected return shape from {function}"))
}

fn uint_to_u64(value: U256, function: &str) -> Result<u64, ProviderError> {
    value
        .try_into()
        .map_err(|_| ProviderError::invalid_input(format!("{function} value exceeds u64")))
}

fn decode_book_summary(values: &[DynSolValue]) -> Result<BookSummary, ProviderError> {
    let [book_id, title, owner, registered_at] = values else {
        return Err(unexpected_shape("getBook"));
    };
    let (registered_at, _) = registered_at
        .as_uint()
        .ok_or_else(|| unexpected_shape("getBook"))?;
    Ok(BookSummary {
        book_id: book_id
            .as_str()
            .ok_or_else(|| unexpected_shape("getBook"))?
            .to_owned(),
        title: title
            .as_str()
            .ok_or_else(|| unexpected_shape("getBook"))?
            .to_owned(),
        current_owner: owner
            .as_address()
            .ok_or_else(|| unexpected_shape("getBook"))?,
        registered_at: uint_to_u64(registered_at, "getBook")?,
    })
}

fn decode_transfer_history(
    values: &[DynSolValue],
) -> Result<Vec<TransferEvent>, ProviderError> {
    let entries = single(values)?
        .as_array()
        .ok_or_else(|| unexpected_shape("getTransferHistory"))?;
    entries
        .iter()
        .map(|entry| {
            let fields = entry
                .as_tuple()
                .ok_or_else(|| unexpected_shape("getTransferHistory"))?;
            let [from, to, timestamp] = fields else {
                return Err(unexpected_shape("getTransferHistory"));
            };
            let (timestamp, _) = timestamp
                .as_uint()
                .ok_or_else(|| unexpected_shape("getTransferHistory"))?;
            Ok(TransferEvent {
                from: from
                    .as_address()
                    .ok_or_else(|| unexpected_shape("getTransferHistory"))?
                    .to_string(),
                to: to
                    .as_address()
                    .ok_or_else(|| unexpected_shape("getTransferHistory"))?
                    .to_string(),
                timestamp: uint_to_u64(timestamp, "getTransferHistory")?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bx_provider::{TransactionReceipt, TransactionRequest, WalletProvider};
    use alloy_primitives::{B256, Bytes};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    const ADDR: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

    fn owner() -> Address {
        "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap()
    }

    fn buyer() -> Address {
        "0x70997970C51812dc3A010C7d01b50e0d17dc79C8".parse().unwrap()
    }

    fn encode_outputs(values: Vec<DynSolValue>) -> Bytes {
        DynSolValue::Tuple(values)
            .abi_encode_sequence()
            .expect("tuple encodes as sequence")
            .into()
    }

    /// Replays scripted eth_call responses in order; accepts every write.
    struct ScriptedProvider {
        calls: Mutex<VecDeque<Result<Bytes, ProviderError>>>,
        signer: bool,
    }

    impl ScriptedProvider {
        fn new(calls: Vec<Result<Bytes, ProviderError>>, signer: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(calls.into()),
                signer,
            })
        }
    }

    #[async_trait]
    impl WalletProvider for ScriptedProvider {
        async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError> {
            Ok(vec![owner()])
        }

        async fn chain_id(&self) -> Result<u64, ProviderError> {
            Ok(31337)
        }

        async fn switch_chain(&self, _chain_id: u64) -> Result<(), ProviderError> {
            Ok(())
        }

        async fn add_chain(
            &self,
            _network: &bx_api_types::NetworkDescriptor,
        ) -> Result<(), ProviderError> {
            Ok(())
        }

        async fn balance_of(&self, _address: Address) -> Result<U256, ProviderError> {
            Ok(U256::ZERO)
        }

        async fn gas_price(&self) -> Result<U256, ProviderError> {
            Ok(U256::from(1))
        }

        async fn transaction_count(&self, _address: Address) -> Result<u64, ProviderError> {
            Ok(0)
        }

        async fn estimate_gas(&self, _tx: &TransactionRequest) -> Result<U256, ProviderError> {
            Ok(U256::from(21_000))
        }

        async fn call(&self, _tx: &TransactionRequest) -> Result<Bytes, ProviderError> {
            self.calls
                .lock()
                .expect("calls lock")
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::transport("unscripted call")))
        }

        async fn send_transaction(&self, _tx: &TransactionRequest) -> Result<B256, ProviderError> {
            Ok(B256::repeat_byte(0x11))
        }

        async fn transaction_receipt(
            &self,
            hash: B256,
        ) -> Result<Option<TransactionReceipt>, ProviderError> {
            Ok(Some(TransactionReceipt {
                transaction_hash: hash,
                block_number: Some(U256::from(1)),
                status: Some(U256::from(1)),
            }))
        }

        fn can_sign(&self) -> bool {
            self.signer
        }
    }

    fn book_outputs() -> Bytes {
        encode_outputs(vec![
            DynSolValue::String("book-1".to_owned()),
            DynSolValue::String("Dune".to_owned()),
            DynSolValue::Address(buyer()),
            DynSolValue::Uint(U256::from(1_700_000_000u64), 256),
        ])
    }

    fn history_outputs() -> Bytes {
        encode_outputs(vec![DynSolValue::Array(vec![DynSolValue::Tuple(vec![
            DynSolValue::Address(owner()),
            DynSolValue::Address(buyer()),
            DynSolValue::Uint(U256::from(1_700_000_500u64), 256),
        ])])])
    }

    #[tokio::test]
    async fn total_books_decodes_the_count() {
        let provider = ScriptedProvider::new(
            vec![Ok(encode_outputs(vec![DynSolValue::Uint(
                U256::from(12),
                256,
            )]))],
            false,
        );
        let registry = BookRegistry::read_only(ADDR, provider).unwrap();
        assert_eq!(registry.total_books().await.unwrap(), 12);
    }

    #[tokio::test]
    async fn verify_ownership_decodes_the_flag() {
        let provider =
            ScriptedProvider::new(vec![Ok(encode_outputs(vec![DynSolValue::Bool(true)]))], false);
        let registry = BookRegistry::read_only(ADDR, provider).unwrap();
        assert!(registry.verify_ownership("book-1", buyer()).await.unwrap());
    }

    #[tokio::test]
    async fn books_by_owner_decodes_ids() {
        let provider = ScriptedProvider::new(
            vec![Ok(encode_outputs(vec![DynSolValue::Array(vec![
                DynSolValue::String("book-1".to_owned()),
                DynSolValue::String("book-7".to_owned()),
            ])]))],
            false,
        );
        let registry = BookRegistry::read_only(ADDR, provider).unwrap();
        assert_eq!(
            registry.books_by_owner(owner()).await.unwrap(),
            vec!["book-1".to_owned(), "book-7".to_owned()]
        );
    }

    #[tokio::test]
    async fn book_record_assembles_view_model_from_batched_reads() {
        let provider =
            ScriptedProvider::new(vec![Ok(book_outputs()), Ok(history_outputs())], false);
        let registry = BookRegistry::read_only(ADDR, provider).unwrap();

        let record = registry.book_record("book-1").await.unwrap();
        assert_eq!(record.book_id, "book-1");
        assert_eq!(record.title, "Dune");
        assert_eq!(record.current_owner, buyer().to_string());
        assert_eq!(record.previous_owners, vec![owner().to_string()]);
        assert_eq!(record.transaction_history.len(), 1);
        assert_eq!(record.registered_at, 1_700_000_000);
        assert_eq!(record.last_updated, 1_700_000_500);
    }

    #[tokio::test]
    async fn missing_book_propagates_not_found() {
        let provider = ScriptedProvider::new(
            vec![
                Err(ProviderError::from_rpc(
                    -32000,
                    "execution reverted: Book does not exist",
                )),
                Ok(history_outputs()),
            ],
            false,
        );
        let registry = BookRegistry::read_only(ADDR, provider).unwrap();

        let err = registry.book_record("missing").await.unwrap_err();
        assert_eq!(err.kind, bx_provider::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn register_book_confirms_through_submitter() {
        let provider = ScriptedProvider::new(vec![], true);
        let registry = BookRegistry::with_signer(ADDR, provider).unwrap();

        let result = registry.register_book(owner(), "book-1", "Dune").await;
        assert!(result.success);
        assert!(result.transaction_hash.unwrap().starts_with("0x"));
    }

    #[tokio::test]
    async fn writes_need_a_signer_capable_provider() {
        let provider = ScriptedProvider::new(vec![], false);
        let err = BookRegistry::with_signer(ADDR, provider).unwrap_err();
        assert_eq!(err.kind, bx_provider::ErrorKind::NotAuthorized);
    }
}
