use alloy_primitives::Address;
use axum::{
    Json,
    extract::{Path, Query, State},
};
use bx_api_types::{
    BookRecord, BooksByOwnerResponse, RegisterBookRequest, TransactionResult, TransferBookRequest,
};
use serde::Deserialize;

use crate::{ApiResult, AppState, bad_request, provider_error, unauthorized};

#[derive(Debug, Deserialize)]
pub(crate) struct OwnerQuery {
    owner: String,
}

pub(crate) async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterBookRequest>,
) -> ApiResult<TransactionResult> {
    if request.book_id.trim().is_empty() {
        return Err(bad_request("book_id is required"));
    }
    if request.title.trim().is_empty() {
        return Err(bad_request("title is required"));
    }
    let from = state
        .session
        .sender()
        .await
        .ok_or_else(|| unauthorized("no wallet connected"))?;

    Ok(Json(
        state
            .registry
            .register_book(from, &request.book_id, &request.title)
            .await,
    ))
}

pub(crate) async fn transfer(
    State(state): State<AppState>,
    Path(book_id): Path<String>,
    Json(request): Json<TransferBookRequest>,
) -> ApiResult<TransactionResult> {
    let new_owner: Address = request
        .new_owner
        .parse()
        .map_err(|_| bad_request("new_owner must be a valid address"))?;
    let from = state
        .session
        .sender()
        .await
        .ok_or_else(|| unauthorized("no wallet connected"))?;

    Ok(Json(
        state
            .registry
            .transfer_ownership(from, &book_id, new_owner)
            .await,
    ))
}

pub(crate) async fn record(
    State(state): State<AppState>,
    Path(book_id): Path<String>,
) -> ApiResult<BookRecord> {
    state
        .registry
        .book_record(&book_id)
        .await
        .map(Json)
        .map_err(provider_error)
}

pub(crate) async fn by_owner(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> ApiResult<BooksByOwnerResponse> {
    let owner: Address = query
        .owner
        .parse()
        .map_err(|_| bad_request("owner must be a valid address"))?;
    let book_ids = state
        .registry
        .books_by_owner(owner)
        .await
        .map_err(provider_error)?;

    Ok(Json(BooksByOwnerResponse {
        owner: owner.to_string(),
        book_ids,
    }))
}
