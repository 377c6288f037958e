use axum::{
    Json,
    extract::{Path, Query, State},
};
use uuid::Uuid;
use wingrow_claims::{ClaimDecision, ClaimItemInput, ItemsSnapshot};
use wingrow_core::{Claim, DomainError, DomainResult};
use wingrow_platform::{
    ClaimListQuery, ClaimListResponse, ClaimTransitionResponse, DecideClaimRequest, DraftResponse,
    MarkPaidRequest,
};

use crate::{app::AppState, auth::Caller, error::ApiResult, extract::ApiJson};

pub async fn create_draft(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> ApiResult<DraftResponse> {
    let claim_id = state.claims.get_or_create_draft(&caller.user_id).await?;
    Ok(Json(DraftResponse { claim_id }))
}

pub async fn add_item(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(claim_id): Path<String>,
    ApiJson(input): ApiJson<ClaimItemInput>,
) -> ApiResult<ItemsSnapshot> {
    let claim_id = parse_claim_id(&claim_id)?;
    let snapshot = state
        .claims
        .add_item(claim_id, &caller.user_id, input)
        .await?;
    Ok(Json(snapshot))
}

pub async fn remove_item(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path((claim_id, index)): Path<(String, String)>,
) -> ApiResult<ItemsSnapshot> {
    let claim_id = parse_claim_id(&claim_id)?;
    let snapshot = state
        .claims
        .remove_item(claim_id, &caller.user_id, &index)
        .await?;
    Ok(Json(snapshot))
}

pub async fn submit(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(claim_id): Path<String>,
) -> ApiResult<ClaimTransitionResponse> {
    let claim_id = parse_claim_id(&claim_id)?;
    let claim = state.claims.submit(claim_id, &caller.user_id).await?;
    Ok(Json(ClaimTransitionResponse::from(&claim)))
}

pub async fn list_claims(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Query(query): Query<ClaimListQuery>,
) -> ApiResult<ClaimListResponse> {
    let claims = state
        .claims
        .list_visible(&caller, query.mine(), query.status.as_deref())
        .await?;
    Ok(Json(ClaimListResponse { claims }))
}

pub async fn get_claim(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(claim_id): Path<String>,
) -> ApiResult<Claim> {
    let claim_id = parse_claim_id(&claim_id)?;
    let claim = state.claims.get_one(claim_id, &caller).await?;
    Ok(Json(claim))
}

pub async fn list_approvals(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Query(query): Query<ClaimListQuery>,
) -> ApiResult<ClaimListResponse> {
    let claims = state
        .claims
        .approvals(&caller, query.status.as_deref())
        .await?;
    Ok(Json(ClaimListResponse { claims }))
}

pub async fn pending_approvals(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> ApiResult<ClaimListResponse> {
    let claims = state.claims.pending_approvals(&caller).await?;
    Ok(Json(ClaimListResponse { claims }))
}

pub async fn approve(
    state: State<AppState>,
    caller: Caller,
    claim_id: Path<String>,
    body: Option<ApiJson<DecideClaimRequest>>,
) -> ApiResult<ClaimTransitionResponse> {
    decide(state, caller, claim_id, body, ClaimDecision::Approve).await
}

pub async fn reject(
    state: State<AppState>,
    caller: Caller,
    claim_id: Path<String>,
    body: Option<ApiJson<DecideClaimRequest>>,
) -> ApiResult<ClaimTransitionResponse> {
    decide(state, caller, claim_id, body, ClaimDecision::Reject).await
}

pub async fn mark_paid(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(claim_id): Path<String>,
    body: Option<ApiJson<MarkPaidRequest>>,
) -> ApiResult<Claim> {
    let claim_id = parse_claim_id(&claim_id)?;
    let ApiJson(body) = body.unwrap_or_default();
    let claim = state
        .claims
        .mark_paid(claim_id, &caller, body.payment_ref)
        .await?;
    Ok(Json(claim))
}

async fn decide(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(claim_id): Path<String>,
    body: Option<ApiJson<DecideClaimRequest>>,
    decision: ClaimDecision,
) -> ApiResult<ClaimTransitionResponse> {
    let claim_id = parse_claim_id(&claim_id)?;
    let ApiJson(body) = body.unwrap_or_default();
    let claim = state
        .claims
        .decide(claim_id, &caller, decision, body.comment)
        .await?;
    Ok(Json(ClaimTransitionResponse::from(&claim)))
}

/// A malformed id cannot name a stored claim.
fn parse_claim_id(raw: &str) -> DomainResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| DomainError::not_found("claim not found"))
}
