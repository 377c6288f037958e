use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use wingrow_core::{Claim, ClaimStatus, InventoryItem, IssueRequest, SettlementStatus};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftResponse {
    pub claim_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimTransitionResponse {
    pub claim_id: Uuid,
    pub status: ClaimStatus,
}

impl From<&Claim> for ClaimTransitionResponse {
    fn from(claim: &Claim) -> Self {
        Self {
            claim_id: claim.id,
            status: claim.status,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClaimListResponse {
    pub claims: Vec<Claim>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClaimListQuery {
    pub mine: Option<String>,
    pub status: Option<String>,
}

impl ClaimListQuery {
    pub fn mine(&self) -> bool {
        is_truthy(self.mine.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DecideClaimRequest {
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkPaidRequest {
    pub payment_ref: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InventoryItemListResponse {
    pub items: Vec<InventoryItem>,
}

/// Issue request with its derived settlement figures.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRequestView {
    #[serde(flatten)]
    pub request: IssueRequest,
    pub amount_pending: Decimal,
    pub settlement_status: SettlementStatus,
}

impl From<IssueRequest> for IssueRequestView {
    fn from(request: IssueRequest) -> Self {
        Self {
            amount_pending: request.amount_pending(),
            settlement_status: request.settlement_status(),
            request,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IssueRequestListResponse {
    pub requests: Vec<IssueRequestView>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssueRequestListQuery {
    pub mine: Option<String>,
    pub status: Option<String>,
}

impl IssueRequestListQuery {
    pub fn mine(&self) -> bool {
        is_truthy(self.mine.as_deref())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApprovedIssueResponse {
    pub request: IssueRequestView,
    pub item: InventoryItem,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RejectIssueRequest {
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordPaymentRequest {
    #[serde(default)]
    pub amount: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

fn is_truthy(raw: Option<&str>) -> bool {
    raw.map(str::trim)
        .is_some_and(|value| value.eq_ignore_ascii_case("true") || value == "1")
}
