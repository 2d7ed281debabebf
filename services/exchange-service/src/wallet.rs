use axum::{Json, extract::State};
use bx_api_types::{Account, WalletStatusResponse};

use crate::{ApiResult, AppState, provider_error};

pub(crate) async fn connect(State(state): State<AppState>) -> ApiResult<Account> {
    let account = state.session.connect().await.map_err(provider_error)?;
    Ok(Json(account))
}

pub(crate) async fn disconnect(State(state): State<AppState>) -> Json<WalletStatusResponse> {
    state.session.disconnect().await;
    Json(WalletStatusResponse {
        connected: false,
        account: None,
    })
}

pub(crate) async fn status(State(state): State<AppState>) -> Json<WalletStatusResponse> {
    let account = state.session.account().await;
    Json(WalletStatusResponse {
        connected: account.is_some(),
        account,
    })
}
