mod ws;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bx_api_types::{ChainInfo, ConnectionState};
use rand::Rng;
use serde_json::{Value, json};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

pub use ws::WsTransport;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NodeError {
    #[error("all endpoints failed: {0}")]
    ConnectionExhausted(String),
    #[error("already connected or a connect flow is in flight")]
    Busy,
    #[error("connection closed")]
    Closed,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("node returned error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("unexpected response: {0}")]
    InvalidResponse(String),
}

/// An established connection to one node endpoint.
#[async_trait]
pub trait NodeConnection: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, NodeError>;

    /// Resolves once the underlying socket has closed, for any reason.
    async fn wait_closed(&self);

    async fn close(&self);
}

/// Dials a single endpoint. The client owns endpoint ordering and retry
/// policy; transports only dial.
#[async_trait]
pub trait NodeTransport: Send + Sync {
    async fn connect(&self, endpoint: &str) -> Result<Arc<dyn NodeConnection>, NodeError>;
}

#[derive(Debug, Clone)]
pub struct NodeClientConfig {
    /// Endpoints in priority order; the first to answer wins.
    pub endpoints: Vec<String>,
    pub max_reconnect_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for NodeClientConfig {
    fn default() -> Self {
        Self {
            endpoints: vec!["ws://127.0.0.1:9944".to_owned()],
            max_reconnect_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl NodeClientConfig {
    /// Endpoint list from `BX_NODE_ENDPOINTS` (comma-separated, priority
    /// order), falling back to a local node.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var("BX_NODE_ENDPOINTS") {
            let endpoints: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect();
            if !endpoints.is_empty() {
                config.endpoints = endpoints;
            }
        }
        config
    }
}

/// Client for the chain node's RPC socket.
///
/// Owns the connection lifecycle: Disconnected → Connecting → Connected,
/// with a supervisor task that re-runs the connect sequence after an
/// unexpected close. State transitions land in a shared [`ConnectionState`]
/// snapshot that callers may poll at any time.
pub struct NodeClient {
    transport: Arc<dyn NodeTransport>,
    config: NodeClientConfig,
    state: Arc<RwLock<ConnectionState>>,
    connection: Arc<Mutex<Option<Arc<dyn NodeConnection>>>>,
    shutdown: Arc<AtomicBool>,
    // Bumped on every successful connect; a supervisor from an earlier
    // generation must not touch the slot or the shared state.
    generation: Arc<AtomicU64>,
    // First-wins: a second connect flow while one is in flight is rejected.
    connect_guard: Mutex<()>,
}

impl NodeClient {
    pub fn new(transport: Arc<dyn NodeTransport>, config: NodeClientConfig) -> Self {
        Self {
            transport,
            config,
            state: Arc::new(RwLock::new(ConnectionState::default())),
            connection: Arc::new(Mutex::new(None)),
            shutdown: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
            connect_guard: Mutex::new(()),
        }
    }

    pub async fn state(&self) -> ConnectionState {
        self.state.read().await.clone()
    }

    /// Establish a connection, first endpoint to answer wins. When every
    /// endpoint fails the error surfaces immediately; retrying is the
    /// caller's decision, not this layer's.
    ///
    /// First-wins: while a connect flow is in flight, or a connection is
    /// already live, further calls are rejected with [`NodeError::Busy`]
    /// instead of replacing the established socket.
    pub async fn connect(&self) -> Result<(), NodeError> {
        let _guard = self
            .connect_guard
            .try_lock()
            .map_err(|_| NodeError::Busy)?;
        if self.connection.lock().await.is_some() {
            return Err(NodeError::Busy);
        }

        self.shutdown.store(false, Ordering::SeqCst);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut state = self.state.write().await;
            state.is_connecting = true;
            state.error = None;
        }

        let connection = match try_endpoints(&*self.transport, &self.config.endpoints).await {
            Ok(connection) => connection,
            Err(err) => {
                let mut state = self.state.write().await;
                state.is_connecting = false;
                state.error = Some(err.to_string());
                return Err(err);
            }
        };

        let chain_info = fetch_chain_info(&*connection).await;
        {
            let mut state = self.state.write().await;
            state.is_connecting = false;
            state.is_connected = true;
            state.chain_info = chain_info;
            state.error = None;
        }
        *self.connection.lock().await = Some(connection.clone());
        info!("node connected");

        self.spawn_supervisor(connection, generation);
        Ok(())
    }

    /// Terminal: closes the socket and stops the supervisor. No
    /// reconnection follows a caller-initiated disconnect.
    pub async fn disconnect(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(connection) = self.connection.lock().await.take() {
            connection.close().await;
        }
        *self.state.write().await = ConnectionState::default();
    }

    /// Issue an RPC over the current connection.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, NodeError> {
        let connection = self.connection.lock().await.clone();
        match connection {
            Some(connection) => connection.request(method, params).await,
            None => Err(NodeError::Closed),
        }
    }

    /// Watches the live connection and re-runs the connect sequence after
    /// an unexpected close, with exponential backoff plus jitter. After
    /// `max_reconnect_attempts` failed rounds the client goes terminal
    /// with `ConnectionExhausted`.
    ///
    /// The supervisor stands down as soon as its generation is no longer
    /// current, so it can never clobber a connection installed by a later
    /// connect flow, or resurrect one after a `disconnect()`.
    fn spawn_supervisor(&self, initial: Arc<dyn NodeConnection>, generation: u64) {
        let transport = self.transport.clone();
        let config = self.config.clone();
        let state = self.state.clone();
        let slot = self.connection.clone();
        let shutdown = self.shutdown.clone();
        let current_generation = self.generation.clone();
        let stale = move || {
            shutdown.load(Ordering::SeqCst)
                || current_generation.load(Ordering::SeqCst) != generation
        };

        tokio::spawn(async move {
            let mut current = initial;
            'supervise: loop {
                current.wait_closed().await;
                if stale() {
                    return;
                }
                warn!("node connection lost, reconnecting");
                {
                    let mut state = state.write().await;
                    state.is_connected = false;
                    state.is_connecting = true;
                }
                *slot.lock().await = None;

                for attempt in 0..config.max_reconnect_attempts {
                    tokio::time::sleep(backoff_delay(&config, attempt)).await;
                    if stale() {
                        return;
                    }
                    match try_endpoints(&*transport, &config.endpoints).await {
                        Ok(connection) => {
                            // A disconnect or fresh connect may have landed
                            // while the dial was in flight.
                            if stale() {
                                connection.close().await;
                                return;
                            }
                            let chain_info = fetch_chain_info(&*connection).await;
                            {
                                let mut state = state.write().await;
                                state.is_connecting = false;
                                state.is_connected = true;
                                state.chain_info = chain_info;
                                state.error = None;
                            }
                            *slot.lock().await = Some(connection.clone());
                            info!(attempt = attempt + 1, "node reconnected");
                            current = connection;
                            continue 'supervise;
                        }
                        Err(err) => {
                            warn!(attempt = attempt + 1, "reconnect round failed: {err}");
                        }
                    }
                }

                if stale() {
                    return;
                }
                let mut state = state.write().await;
                state.is_connecting = false;
                state.error = Some(
                    NodeError::ConnectionExhausted(format!(
                        "gave up after {} reconnect attempts",
                        config.max_reconnect_attempts
                    ))
                    .to_string(),
                );
                return;
            }
        });
    }
}

/// Try endpoints in priority order; first established connection wins.
async fn try_endpoints(
    transport: &dyn NodeTransport,
    endpoints: &[String],
) -> Result<Arc<dyn NodeConnection>, NodeError> {
    let mut last_error = String::from("no endpoints configured");
    for endpoint in endpoints {
        match transport.connect(endpoint).await {
            Ok(connection) => return Ok(connection),
            Err(err) => {
                warn!(endpoint, "endpoint failed: {err}");
                last_error = err.to_string();
            }
        }
    }
    Err(NodeError::ConnectionExhausted(last_error))
}

/// Exponential backoff with up to 50% additive jitter, capped.
fn backoff_delay(config: &NodeClientConfig, attempt: u32) -> Duration {
    let base = config
        .initial_backoff
        .saturating_mul(2u32.saturating_pow(attempt))
        .min(config.max_backoff);
    let jitter_ceiling = base.as_millis() as u64 / 2;
    let jitter = if jitter_ceiling == 0 {
        0
    } else {
        rand::thread_rng().gen_range(0..=jitter_ceiling)
    };
    base + Duration::from_millis(jitter)
}

/// Chain identity lookup after connecting; degraded nodes just leave the
/// fields unset.
async fn fetch_chain_info(connection: &dyn NodeConnection) -> Option<ChainInfo> {
    let name = match connection.request("system_chain", json!([])).await {
        Ok(Value::String(name)) => name,
        Ok(other) => {
            warn!("system_chain returned non-string: {other}");
            return None;
        }
        Err(err) => {
            warn!("system_chain failed: {err}");
            return None;
        }
    };

    let (token_symbol, token_decimals) =
        match connection.request("system_properties", json!([])).await {
            Ok(properties) => (
                property_string(&properties, "tokenSymbol"),
                // A value that does not fit u8 is a broken node answer;
                // leave the field unset rather than truncate.
                property_u64(&properties, "tokenDecimals").and_then(|d| u8::try_from(d).ok()),
            ),
            Err(err) => {
                warn!("system_properties failed: {err}");
                (None, None)
            }
        };

    Some(ChainInfo {
        name,
        token_symbol,
        token_decimals,
    })
}

// system_properties values come back either scalar or as one-element
// arrays, depending on the node.
fn property_string(properties: &Value, key: &str) -> Option<String> {
    match properties.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.first()?.as_str().map(str::to_owned),
        _ => None,
    }
}

fn property_u64(properties: &Value, key: &str) -> Option<u64> {
    match properties.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::Array(items) => items.first()?.as_u64(),
        _ => None,
    }
}
