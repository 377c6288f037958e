use axum::{
    Json,
    extract::{Path, Query, State},
};
use uuid::Uuid;
use wingrow_core::{DomainError, DomainResult, InventoryItem};
use wingrow_inventory::{
    ApproveInput, ApprovedIssue, DEFAULT_CATALOG, ItemPatch, NewIssueRequest, PaymentSummary,
};
use wingrow_platform::{
    ApprovedIssueResponse, InventoryItemListResponse, IssueRequestListQuery,
    IssueRequestListResponse, IssueRequestView, RecordPaymentRequest, RejectIssueRequest,
};

use crate::{app::AppState, auth::Caller, error::ApiResult, extract::ApiJson};

pub async fn list_items(
    State(state): State<AppState>,
    Caller(_caller): Caller,
) -> ApiResult<InventoryItemListResponse> {
    let items = state.ledger.list_items().await?;
    Ok(Json(InventoryItemListResponse { items }))
}

pub async fn seed_catalog(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> ApiResult<InventoryItemListResponse> {
    caller.require_manager()?;
    let items = state.ledger.seed_catalog(&DEFAULT_CATALOG).await?;
    Ok(Json(InventoryItemListResponse { items }))
}

pub async fn patch_item(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(item_id): Path<String>,
    ApiJson(patch): ApiJson<ItemPatch>,
) -> ApiResult<InventoryItem> {
    caller.require_manager()?;
    let item_id = parse_id(&item_id, "item not found")?;
    let item = state.ledger.apply_patch(item_id, &patch).await?;
    Ok(Json(item))
}

pub async fn create_request(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiJson(input): ApiJson<NewIssueRequest>,
) -> ApiResult<IssueRequestView> {
    let request = state.requests.create(&caller, input).await?;
    Ok(Json(request.into()))
}

pub async fn list_requests(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Query(query): Query<IssueRequestListQuery>,
) -> ApiResult<IssueRequestListResponse> {
    let requests = state
        .requests
        .list(&caller, query.mine(), query.status.as_deref())
        .await?;
    Ok(Json(IssueRequestListResponse {
        requests: requests.into_iter().map(IssueRequestView::from).collect(),
    }))
}

pub async fn approve_request(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(request_id): Path<String>,
    body: Option<ApiJson<ApproveInput>>,
) -> ApiResult<ApprovedIssueResponse> {
    let request_id = parse_id(&request_id, "request not found")?;
    let ApiJson(input) = body.unwrap_or_default();
    let ApprovedIssue { request, item } =
        state.requests.approve(request_id, &caller, input).await?;
    Ok(Json(ApprovedIssueResponse {
        request: request.into(),
        item,
    }))
}

pub async fn reject_request(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(request_id): Path<String>,
    body: Option<ApiJson<RejectIssueRequest>>,
) -> ApiResult<IssueRequestView> {
    let request_id = parse_id(&request_id, "request not found")?;
    let ApiJson(body) = body.unwrap_or_default();
    let request = state
        .requests
        .reject(request_id, &caller, body.note)
        .await?;
    Ok(Json(request.into()))
}

pub async fn record_payment(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(request_id): Path<String>,
    ApiJson(body): ApiJson<RecordPaymentRequest>,
) -> ApiResult<PaymentSummary> {
    let request_id = parse_id(&request_id, "request not found")?;
    let summary = state
        .requests
        .record_payment(request_id, &caller, &body.amount)
        .await?;
    Ok(Json(summary))
}

fn parse_id(raw: &str, missing: &str) -> DomainResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| DomainError::not_found(missing))
}
