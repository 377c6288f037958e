use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;
use wingrow_core::{
    ApprovalCommand, ApprovalOutcome, CallerContext, Decision, DomainError, DomainResult,
    InventoryItem, InventoryStore, IssueRequest, PaymentOutcome, RequestFilter, RequestStatus,
    SettlementStatus,
    input::{non_negative_amount, positive_integer},
    totals,
};

use crate::ledger::item_not_found;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewIssueRequest {
    pub item_id: Option<String>,
    #[serde(default)]
    pub qty: Value,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveInput {
    /// Absent or null falls back to the requested quantity.
    #[serde(default)]
    pub issued_qty: Option<Value>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApprovedIssue {
    pub request: IssueRequest,
    pub item: InventoryItem,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSummary {
    pub request_id: Uuid,
    pub amount_paid: Decimal,
    pub amount_pending: Decimal,
    pub total_cost: Decimal,
    pub unit_price: Decimal,
    pub settlement_status: SettlementStatus,
}

impl From<&IssueRequest> for PaymentSummary {
    fn from(request: &IssueRequest) -> Self {
        Self {
            request_id: request.id,
            amount_paid: request.amount_paid,
            amount_pending: request.amount_pending(),
            total_cost: request.total_cost,
            unit_price: request.unit_price.unwrap_or(Decimal::ZERO),
            settlement_status: request.settlement_status(),
        }
    }
}

/// Issue requests from creation through decision and settlement.
#[derive(Clone)]
pub struct IssueRequestService {
    store: Arc<dyn InventoryStore>,
}

impl IssueRequestService {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self { store }
    }

    pub async fn create(
        &self,
        caller: &CallerContext,
        input: NewIssueRequest,
    ) -> DomainResult<IssueRequest> {
        let raw_item_id = input
            .item_id
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| DomainError::validation("itemId and positive integer qty required"))?;
        let qty = positive_integer(&input.qty, "qty")?;

        // A malformed id cannot name an existing item.
        let item_id = Uuid::parse_str(raw_item_id).map_err(|_| item_not_found())?;
        let item = self
            .store
            .fetch_item(item_id)
            .await?
            .ok_or_else(item_not_found)?;

        let note = input.note.unwrap_or_default().trim().to_string();
        let request = IssueRequest::pending(&caller.user_id, &item, qty, note, Utc::now());
        self.store.insert_request(&request).await?;

        info!(
            request_id = %request.id,
            requested_by = %caller.user_id,
            item = %item.name,
            qty,
            "issue request created"
        );
        Ok(request)
    }

    /// Non-managers, and managers passing `mine`, see only their own requests.
    /// An unrecognised status is ignored rather than rejected.
    pub async fn list(
        &self,
        caller: &CallerContext,
        mine: bool,
        status: Option<&str>,
    ) -> DomainResult<Vec<IssueRequest>> {
        let requested_by = (mine || !caller.is_manager()).then(|| caller.user_id.clone());
        let status = status
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .and_then(|raw| raw.parse::<RequestStatus>().ok());

        Ok(self
            .store
            .list_requests(&RequestFilter {
                requested_by,
                status,
            })
            .await?)
    }

    pub async fn approve(
        &self,
        request_id: Uuid,
        caller: &CallerContext,
        input: ApproveInput,
    ) -> DomainResult<ApprovedIssue> {
        caller.require_manager()?;
        let request = self.pending_request(request_id).await?;

        let issued_qty = match input.issued_qty.as_ref().filter(|value| !value.is_null()) {
            Some(raw) => positive_integer(raw, "issuedQty")?,
            None => request.qty,
        };

        let command = ApprovalCommand {
            request_id,
            issued_qty,
            decision: decision_by(caller, input.note),
        };

        match self.store.approve_request(&command).await? {
            ApprovalOutcome::Approved { request, item } => {
                info!(
                    %request_id,
                    manager = %caller.user_id,
                    issued_qty,
                    total_cost = %request.total_cost,
                    remaining_stock = item.stock,
                    "issue request approved"
                );
                Ok(ApprovedIssue { request, item })
            }
            ApprovalOutcome::InsufficientStock { available } => {
                warn!(%request_id, issued_qty, available, "issue request approval short on stock");
                Err(DomainError::InsufficientStock {
                    requested: issued_qty,
                    available,
                })
            }
            ApprovalOutcome::RequestMissing => Err(request_not_found()),
            ApprovalOutcome::NotPending => Err(not_pending()),
            ApprovalOutcome::ItemMissing => Err(item_not_found()),
            ApprovalOutcome::TotalOutOfRange => Err(DomainError::validation(format!(
                "issuing {issued_qty} would push the cost past {}",
                totals::MONEY_LIMIT
            ))),
        }
    }

    pub async fn reject(
        &self,
        request_id: Uuid,
        caller: &CallerContext,
        note: Option<String>,
    ) -> DomainResult<IssueRequest> {
        caller.require_manager()?;
        self.pending_request(request_id).await?;

        let request = self
            .store
            .reject_request(request_id, &decision_by(caller, note))
            .await?
            .ok_or_else(not_pending)?;

        info!(%request_id, manager = %caller.user_id, "issue request rejected");
        Ok(request)
    }

    /// Payments accrue only on approved requests and may exceed the total;
    /// the pending amount bottoms out at zero.
    pub async fn record_payment(
        &self,
        request_id: Uuid,
        caller: &CallerContext,
        raw_amount: &Value,
    ) -> DomainResult<PaymentSummary> {
        let amount = non_negative_amount(raw_amount, "amount")?;
        let request = self
            .store
            .fetch_request(request_id)
            .await?
            .ok_or_else(request_not_found)?;
        if request.status != RequestStatus::Approved {
            return Err(not_approved(request.status));
        }

        let updated = match self.store.record_payment(request_id, amount, Utc::now()).await? {
            PaymentOutcome::Recorded(updated) => updated,
            PaymentOutcome::RequestMissing => return Err(request_not_found()),
            PaymentOutcome::NotApproved => {
                return Err(DomainError::invalid_state(
                    "request changed status before the payment was recorded",
                ));
            }
            PaymentOutcome::AmountOutOfRange => {
                return Err(DomainError::validation(format!(
                    "amount paid would exceed {}",
                    totals::MONEY_LIMIT
                )));
            }
        };

        info!(
            %request_id,
            recorded_by = %caller.user_id,
            %amount,
            amount_paid = %updated.amount_paid,
            "issue request payment recorded"
        );
        Ok(PaymentSummary::from(&updated))
    }

    async fn pending_request(&self, request_id: Uuid) -> DomainResult<IssueRequest> {
        let request = self
            .store
            .fetch_request(request_id)
            .await?
            .ok_or_else(request_not_found)?;
        if request.status != RequestStatus::Pending {
            return Err(not_pending());
        }
        Ok(request)
    }
}

fn decision_by(caller: &CallerContext, note: Option<String>) -> Decision {
    Decision {
        decided_by: caller.user_id.clone(),
        decided_at: Utc::now(),
        note: note
            .map(|note| note.trim().to_string())
            .filter(|note| !note.is_empty()),
    }
}

fn request_not_found() -> DomainError {
    DomainError::not_found("request not found")
}

fn not_pending() -> DomainError {
    DomainError::invalid_state("request is not pending")
}

fn not_approved(status: RequestStatus) -> DomainError {
    DomainError::invalid_state(format!(
        "payments can only be recorded against approved requests (request is {status})"
    ))
}
