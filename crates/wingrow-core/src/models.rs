use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::totals;

pub const DEFAULT_ITEM_CATEGORY: &str = "Other";
pub const DEFAULT_CATALOG_STOCK: i64 = 20;
pub const DEFAULT_CATALOG_UNIT: &str = "pcs";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
    Paid,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Submitted => "SUBMITTED",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Paid => "PAID",
        }
    }

    /// Stored statuses matched when listing by `self`.
    ///
    /// The approved bucket keeps paid claims so it stays stable after payment.
    pub fn query_bucket(self) -> Vec<ClaimStatus> {
        match self {
            Self::Approved => vec![Self::Approved, Self::Paid],
            other => vec![other],
        }
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClaimStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "DRAFT" => Ok(Self::Draft),
            "SUBMITTED" => Ok(Self::Submitted),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            "PAID" => Ok(Self::Paid),
            _ => Err(DomainError::validation(format!(
                "invalid claim status '{value}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClaimItem {
    pub date: DateTime<Utc>,
    pub category: String,
    pub amount: Decimal,
    pub notes: String,
    pub receipt_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub id: Uuid,
    pub owner_id: String,
    pub status: ClaimStatus,
    pub items: Vec<ClaimItem>,
    pub total_amount: Decimal,
    pub approved_by: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub manager_comment: String,
    pub payment_ref: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Claim {
    pub fn new_draft(owner_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.to_string(),
            status: ClaimStatus::Draft,
            items: Vec::new(),
            total_amount: Decimal::ZERO,
            approved_by: None,
            decided_at: None,
            manager_comment: String::new(),
            payment_ref: String::new(),
            paid_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_draft_of(&self, owner_id: &str) -> bool {
        self.status == ClaimStatus::Draft && self.owner_id == owner_id
    }

    pub fn recompute_total(&mut self) -> DomainResult<()> {
        self.total_amount = totals::claim_total(&self.items).ok_or_else(|| {
            DomainError::validation(format!(
                "claim total would exceed {}",
                totals::MONEY_LIMIT
            ))
        })?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

#[derive(Debug, Clone, Default)]
pub struct ClaimFilter {
    pub owner_id: Option<String>,
    /// Empty matches every status.
    pub statuses: Vec<ClaimStatus>,
    pub order: SortOrder,
}

impl ClaimFilter {
    pub fn matches(&self, claim: &Claim) -> bool {
        self.owner_id
            .as_deref()
            .is_none_or(|owner| claim.owner_id == owner)
            && (self.statuses.is_empty() || self.statuses.contains(&claim.status))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: Uuid,
    pub name: String,
    pub unit: String,
    pub stock: i64,
    pub unit_price: Decimal,
    /// Sum of approved requests' totals, kept for display.
    pub total_cost: Decimal,
    /// Sum of payments recorded against this item's requests.
    pub amount_paid: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    pub fn catalog_entry(name: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            unit: DEFAULT_CATALOG_UNIT.to_string(),
            stock: DEFAULT_CATALOG_STOCK,
            unit_price: Decimal::ZERO,
            total_cost: Decimal::ZERO,
            amount_paid: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            _ => Err(DomainError::validation(format!(
                "invalid request status '{value}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettlementStatus {
    Due,
    Partial,
    Paid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IssueRequest {
    pub id: Uuid,
    pub requested_by: String,
    pub item_id: Uuid,
    /// Item name at creation time.
    pub item_name: String,
    pub qty: i64,
    pub note: String,
    pub status: RequestStatus,
    pub issued_qty: Option<i64>,
    /// Item price frozen at approval.
    pub unit_price: Option<Decimal>,
    pub total_cost: Decimal,
    pub amount_paid: Decimal,
    pub decided_by: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decision_note: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IssueRequest {
    pub fn pending(
        requested_by: &str,
        item: &InventoryItem,
        qty: i64,
        note: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            requested_by: requested_by.to_string(),
            item_id: item.id,
            item_name: item.name.clone(),
            qty,
            note,
            status: RequestStatus::Pending,
            issued_qty: None,
            unit_price: None,
            total_cost: Decimal::ZERO,
            amount_paid: Decimal::ZERO,
            decided_by: None,
            decided_at: None,
            decision_note: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn amount_pending(&self) -> Decimal {
        totals::amount_pending(self.total_cost, self.amount_paid)
    }

    pub fn settlement_status(&self) -> SettlementStatus {
        totals::settlement_status(self.total_cost, self.amount_paid)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub requested_by: Option<String>,
    pub status: Option<RequestStatus>,
}

impl RequestFilter {
    pub fn matches(&self, request: &IssueRequest) -> bool {
        self.requested_by
            .as_deref()
            .is_none_or(|requester| request.requested_by == requester)
            && self.status.is_none_or(|status| request.status == status)
    }
}
