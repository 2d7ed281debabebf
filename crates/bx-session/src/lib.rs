mod binding;
pub mod networks;
mod read;
mod submit;
#[cfg(test)]
pub(crate) mod testutil;

use std::sync::Arc;

use alloy_primitives::{Address, U256};
use bx_api_types::{Account, NetworkDescriptor};
use bx_provider::{ErrorKind, ProviderError, WalletProvider};
use bx_store::SessionStore;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

pub use binding::{ContractBinding, ContractHandle};
pub use read::{ReadCall, ReadOutcome, read_all};
pub use submit::{SubmitOptions, submit, submit_with};

struct ActiveAccount {
    address: Address,
    info: Account,
}

/// One wallet session against one target chain.
///
/// Explicitly constructed and passed around; holds no global state. The
/// provider and store are injected so the session itself never touches the
/// environment.
pub struct WalletSession {
    provider: Arc<dyn WalletProvider>,
    store: Arc<dyn SessionStore>,
    target: NetworkDescriptor,
    account: RwLock<Option<ActiveAccount>>,
    // Guards against two connect flows racing (e.g. a double-click):
    // the first one in wins, the second is rejected.
    connect_guard: Mutex<()>,
}

impl WalletSession {
    pub fn new(
        provider: Arc<dyn WalletProvider>,
        store: Arc<dyn SessionStore>,
        target: NetworkDescriptor,
    ) -> Self {
        Self {
            provider,
            store,
            target,
            account: RwLock::new(None),
            connect_guard: Mutex::new(()),
        }
    }

    pub fn target(&self) -> &NetworkDescriptor {
        &self.target
    }

    pub fn provider(&self) -> Arc<dyn WalletProvider> {
        self.provider.clone()
    }

    /// Request account access, align the wallet's active chain with the
    /// target (switching, or adding then switching, as needed), and record
    /// the session as connected.
    pub async fn connect(&self) -> Result<Account, ProviderError> {
        let _guard = self
            .connect_guard
            .try_lock()
            .map_err(|_| ProviderError::busy("a connect flow is already in progress"))?;

        let accounts = self.provider.request_accounts().await?;
        let Some(address) = accounts.first().copied() else {
            return Err(ProviderError::provider_unavailable(
                "wallet returned no accounts",
            ));
        };

        self.ensure_target_network().await?;

        // Balance is decoration; a failed lookup must not fail the connect.
        let balance = match self.provider.balance_of(address).await {
            Ok(wei) => Some(format_balance(wei, self.target.native_currency.decimals)),
            Err(err) => {
                warn!("balance lookup failed: {err}");
                None
            }
        };

        let info = Account {
            address: address.to_string(),
            balance,
            chain_id: Some(self.target.chain_id),
        };
        *self.account.write().await = Some(ActiveAccount {
            address,
            info: info.clone(),
        });

        if let Err(err) = self.store.set_was_connected(true).await {
            warn!("could not persist session flag: {err}");
        }
        info!(address = %info.address, chain_id = self.target.chain_id, "wallet connected");
        Ok(info)
    }

    /// A wallet already on the target chain performs neither a switch nor
    /// an add. An unrecognized-chain response to the switch triggers an
    /// add carrying the descriptor verbatim, then a second switch.
    async fn ensure_target_network(&self) -> Result<(), ProviderError> {
        let active = self.provider.chain_id().await?;
        if active == self.target.chain_id {
            return Ok(());
        }

        match self.provider.switch_chain(self.target.chain_id).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind == ErrorKind::UnrecognizedChain => {
                self.provider.add_chain(&self.target).await.map_err(|err| {
                    if err.kind == ErrorKind::UserRejected {
                        err
                    } else {
                        ProviderError::new(
                            ErrorKind::NetworkMismatch,
                            format!("wallet would not add {}: {}", self.target.name, err.message),
                        )
                    }
                })?;
                self.provider
                    .switch_chain(self.target.chain_id)
                    .await
                    .map_err(|err| {
                        ProviderError::new(
                            ErrorKind::NetworkMismatch,
                            format!(
                                "wallet would not switch to {}: {}",
                                self.target.name, err.message
                            ),
                        )
                    })
            }
            Err(err) if err.kind == ErrorKind::UserRejected => Err(err),
            Err(err) => Err(ProviderError::new(
                ErrorKind::NetworkMismatch,
                format!(
                    "wallet would not switch to {}: {}",
                    self.target.name, err.message
                ),
            )),
        }
    }

    /// Caller-initiated and terminal: clears the account and the persisted
    /// flag, so no silent reconnect happens on the next load.
    pub async fn disconnect(&self) {
        *self.account.write().await = None;
        if let Err(err) = self.store.set_was_connected(false).await {
            warn!("could not clear session flag: {err}");
        }
    }

    /// Silent reconnect attempt, made only when a previous session left the
    /// connected flag behind. `None` means no attempt was made.
    pub async fn reconnect_if_previously_connected(
        &self,
    ) -> Option<Result<Account, ProviderError>> {
        match self.store.was_connected().await {
            Ok(true) => Some(self.connect().await),
            Ok(false) => None,
            Err(err) => {
                warn!("session store read failed: {err}");
                None
            }
        }
    }

    pub async fn account(&self) -> Option<Account> {
        self.account.read().await.as_ref().map(|a| a.info.clone())
    }

    /// Address transactions are sent from, when connected.
    pub async fn sender(&self) -> Option<Address> {
        self.account.read().await.as_ref().map(|a| a.address)
    }

    pub fn read_handle(&self, binding: Arc<ContractBinding>) -> ContractHandle {
        ContractHandle::read_only(binding, self.provider.clone())
    }

    pub fn signer_handle(
        &self,
        binding: Arc<ContractBinding>,
    ) -> Result<ContractHandle, ProviderError> {
        ContractHandle::with_signer(binding, self.provider.clone())
    }
}

/// Render a wei-denominated amount as a decimal string in whole units.
fn format_balance(wei: U256, decimals: u8) -> String {
    let base = U256::from(10).pow(U256::from(decimals));
    let whole = wei / base;
    let frac = wei % base;
    if frac.is_zero() {
        return whole.to_string();
    }
    let padded = format!("{:0>width$}", frac.to_string(), width = decimals as usize);
    format!("{whole}.{}", padded.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{FakeProvider, test_account};
    use bx_store::{InMemoryStore, SessionStore};
    use std::time::Duration;

    fn target() -> NetworkDescriptor {
        networks::network_info(networks::HARDHAT_LOCAL)
    }

    fn session_with(
        provider: FakeProvider,
    ) -> (WalletSession, Arc<FakeProvider>, Arc<InMemoryStore>) {
        let provider = Arc::new(provider);
        let store = Arc::new(InMemoryStore::default());
        let session = WalletSession::new(provider.clone(), store.clone(), target());
        (session, provider, store)
    }

    #[tokio::test]
    async fn connect_on_target_chain_skips_switch_and_add() {
        let (session, fake, store) = session_with(FakeProvider::default());

        let account = session.connect().await.unwrap();

        assert_eq!(account.address, test_account().to_string());
        assert_eq!(account.chain_id, Some(networks::HARDHAT_LOCAL));
        assert!(store.was_connected().await.unwrap());
        assert!(session.sender().await.is_some());

        // The wallet saw neither a switch nor an add prompt.
        assert!(fake.switch_calls.lock().unwrap().is_empty());
        assert!(fake.added.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn switch_and_add_flow_carries_descriptor_verbatim() {
        let (session, fake, _) = session_with(FakeProvider {
            chain: std::sync::Mutex::new(1),
            known_chains: std::sync::Mutex::new(vec![1]),
            ..FakeProvider::default()
        });

        session.connect().await.unwrap();

        // Switch fails unrecognized, the add lands, then the switch repeats.
        let switches = fake.switch_calls.lock().unwrap().clone();
        assert_eq!(
            switches,
            vec![networks::HARDHAT_LOCAL, networks::HARDHAT_LOCAL]
        );

        let added = fake.added.lock().unwrap().clone();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0], target());
        assert_eq!(*fake.chain.lock().unwrap(), networks::HARDHAT_LOCAL);
    }

    #[tokio::test]
    async fn rejected_prompt_surfaces_user_rejected_and_leaves_flag_clear() {
        let (session, _, store) = session_with(FakeProvider {
            reject_accounts: true,
            ..FakeProvider::default()
        });

        let err = session.connect().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::UserRejected);
        assert!(!store.was_connected().await.unwrap());
        assert!(session.account().await.is_none());
    }

    #[tokio::test]
    async fn disconnect_clears_account_and_flag() {
        let (session, _, store) = session_with(FakeProvider::default());
        session.connect().await.unwrap();
        assert!(store.was_connected().await.unwrap());

        session.disconnect().await;
        assert!(session.account().await.is_none());
        assert!(!store.was_connected().await.unwrap());
    }

    #[tokio::test]
    async fn silent_reconnect_only_runs_when_flag_is_set() {
        let (session, _, store) = session_with(FakeProvider::default());

        assert!(session.reconnect_if_previously_connected().await.is_none());

        store.set_was_connected(true).await.unwrap();
        let attempt = session.reconnect_if_previously_connected().await;
        assert!(attempt.unwrap().is_ok());
    }

    #[tokio::test]
    async fn second_connect_while_one_is_in_flight_is_rejected() {
        let (session, _, _) = session_with(FakeProvider::default());

        // Hold the guard the way an in-flight connect would.
        let _held = session.connect_guard.lock().await;

        let result = tokio::time::timeout(Duration::from_secs(1), session.connect())
            .await
            .expect("connect must not block while guarded");
        assert_eq!(result.unwrap_err().kind, ErrorKind::Busy);
    }

    #[test]
    fn balance_formats_as_decimal_string() {
        let one_eth = U256::from(10).pow(U256::from(18));
        assert_eq!(format_balance(one_eth, 18), "1");
        assert_eq!(format_balance(one_eth * U256::from(3) / U256::from(2), 18), "1.5");
        assert_eq!(format_balance(U256::from(1), 18), "0.000000000000000001");
        assert_eq!(format_balance(U256::ZERO, 18), "0");
    }
}
