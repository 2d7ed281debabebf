mod books;
mod wallet;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use bx_api_types::{ConnectionState, NetworkDescriptor};
use bx_node_client::{NodeClient, NodeClientConfig, NodeError, WsTransport};
use bx_provider::{ErrorKind, ProviderError, WalletProvider};
use bx_provider_http::HttpWalletProvider;
use bx_registry::BookRegistry;
use bx_session::{WalletSession, networks};
use bx_store::FileStore;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

#[derive(Debug, Serialize)]
struct HealthResponse {
    service: &'static str,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct VersionResponse {
    service: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}

pub(crate) type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) session: Arc<WalletSession>,
    pub(crate) registry: Arc<BookRegistry>,
    pub(crate) node: Arc<NodeClient>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let chain_id = std::env::var("BX_CHAIN_ID")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(networks::HARDHAT_LOCAL);
    let registry_address = std::env::var("BX_REGISTRY_ADDRESS")
        .unwrap_or_else(|_| "0x5FbDB2315678afecb367f032d93F642f64180aa3".to_owned());

    let provider: Arc<dyn WalletProvider> = Arc::new(HttpWalletProvider::new(None));
    let store = Arc::new(FileStore::open_default());
    let session = Arc::new(WalletSession::new(
        provider.clone(),
        store,
        networks::network_info(chain_id),
    ));
    let registry = Arc::new(BookRegistry::with_signer(&registry_address, provider)?);
    let node = Arc::new(NodeClient::new(
        Arc::new(WsTransport),
        NodeClientConfig::from_env(),
    ));

    let app = router(AppState {
        session,
        registry,
        node,
    });

    let addr: SocketAddr = std::env::var("BX_LISTEN_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_owned())
        .parse()?;
    info!("exchange-service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .route("/network/{chain_id}", get(network))
        .route("/wallet/connect", post(wallet::connect))
        .route("/wallet/disconnect", post(wallet::disconnect))
        .route("/wallet/status", get(wallet::status))
        .route("/books", get(books::by_owner))
        .route("/books/register", post(books::register))
        .route("/books/{book_id}", get(books::record))
        .route("/books/{book_id}/transfer", post(books::transfer))
        .route("/node/connect", post(node_connect))
        .route("/node/disconnect", post(node_disconnect))
        .route("/node/status", get(node_status))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        service: "exchange-service",
        status: "ok",
    })
}

async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        service: "exchange-service",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Descriptor lookup; unknown ids get the generic fallback rather than 404.
async fn network(Path(chain_id): Path<u64>) -> Json<NetworkDescriptor> {
    Json(networks::network_info(chain_id))
}

async fn node_connect(State(state): State<AppState>) -> ApiResult<ConnectionState> {
    if let Err(err) = state.node.connect().await {
        let status = match err {
            NodeError::Busy => StatusCode::CONFLICT,
            _ => StatusCode::BAD_GATEWAY,
        };
        return Err((
            status,
            Json(ErrorResponse {
                error: err.to_string(),
            }),
        ));
    }
    Ok(Json(state.node.state().await))
}

async fn node_disconnect(State(state): State<AppState>) -> Json<ConnectionState> {
    state.node.disconnect().await;
    Json(state.node.state().await)
}

async fn node_status(State(state): State<AppState>) -> Json<ConnectionState> {
    Json(state.node.state().await)
}

pub(crate) fn bad_request(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_owned(),
        }),
    )
}

pub(crate) fn unauthorized(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: message.to_owned(),
        }),
    )
}

pub(crate) fn provider_error(err: ProviderError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match err.kind {
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::NotAuthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::UserRejected | ErrorKind::Busy | ErrorKind::AlreadyExists => {
            StatusCode::CONFLICT
        }
        ErrorKind::ProviderUnavailable
        | ErrorKind::NetworkMismatch
        | ErrorKind::UnrecognizedChain
        | ErrorKind::ConnectionExhausted
        | ErrorKind::Transport => StatusCode::BAD_GATEWAY,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.message,
        }),
    )
}
