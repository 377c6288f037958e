use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{Claim, ClaimFilter, InventoryItem, IssueRequest, RequestFilter};

/// Claim documents with per-document optimistic concurrency.
#[async_trait]
pub trait ClaimStore: Send + Sync {
    /// Returns the owner's DRAFT claim, creating an empty one if none exists.
    /// At most one DRAFT per owner exists even under concurrent calls.
    async fn draft_for_owner(&self, owner_id: &str, now: DateTime<Utc>) -> anyhow::Result<Claim>;

    async fn fetch(&self, claim_id: Uuid) -> anyhow::Result<Option<Claim>>;

    /// Persists `claim` only if the stored version still equals
    /// `expected_version`; the stored version then becomes
    /// `expected_version + 1`. Returns `false` when the write lost a race.
    async fn replace(&self, claim: &Claim, expected_version: i64) -> anyhow::Result<bool>;

    async fn list(&self, filter: &ClaimFilter) -> anyhow::Result<Vec<Claim>>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum StockDecrement {
    Applied(InventoryItem),
    Insufficient { available: i64 },
    Missing,
}

#[derive(Debug, Clone)]
pub struct Decision {
    pub decided_by: String,
    pub decided_at: DateTime<Utc>,
    pub note: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ApprovalCommand {
    pub request_id: Uuid,
    pub issued_qty: i64,
    pub decision: Decision,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApprovalOutcome {
    Approved {
        request: IssueRequest,
        item: InventoryItem,
    },
    RequestMissing,
    NotPending,
    ItemMissing,
    InsufficientStock {
        available: i64,
    },
    /// The issue cost or the item's running total would pass the money limit.
    TotalOutOfRange,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaymentOutcome {
    Recorded(IssueRequest),
    RequestMissing,
    NotApproved,
    /// The request's or the item's paid total would pass the money limit.
    AmountOutOfRange,
}

/// Inventory items and issue requests.
///
/// Every method that mutates stock or a request's status is a single atomic
/// conditional update; callers never read-then-write those fields.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Items sorted by name ascending.
    async fn list_items(&self) -> anyhow::Result<Vec<InventoryItem>>;

    /// Inserts `item` unless an item with the same name exists.
    async fn insert_item_if_absent(&self, item: &InventoryItem) -> anyhow::Result<bool>;

    async fn fetch_item(&self, item_id: Uuid) -> anyhow::Result<Option<InventoryItem>>;

    async fn set_stock(
        &self,
        item_id: Uuid,
        stock: i64,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<InventoryItem>>;

    async fn set_unit_price(
        &self,
        item_id: Uuid,
        unit_price: Decimal,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<InventoryItem>>;

    /// Subtracts `qty` only if the current stock covers it.
    async fn decrement_stock(
        &self,
        item_id: Uuid,
        qty: i64,
        now: DateTime<Utc>,
    ) -> anyhow::Result<StockDecrement>;

    async fn insert_request(&self, request: &IssueRequest) -> anyhow::Result<()>;

    async fn fetch_request(&self, request_id: Uuid) -> anyhow::Result<Option<IssueRequest>>;

    /// Newest first.
    async fn list_requests(&self, filter: &RequestFilter) -> anyhow::Result<Vec<IssueRequest>>;

    /// Applies an approval as one unit: the request must still be PENDING and
    /// the item must cover `issued_qty`. The unit price is frozen from the
    /// item as it stands when the decrement applies. Nothing is written unless
    /// the outcome is `Approved`.
    async fn approve_request(&self, command: &ApprovalCommand) -> anyhow::Result<ApprovalOutcome>;

    /// Rejects a PENDING request. `None` when the request is absent or no
    /// longer pending.
    async fn reject_request(
        &self,
        request_id: Uuid,
        decision: &Decision,
    ) -> anyhow::Result<Option<IssueRequest>>;

    /// Adds `amount` to an APPROVED request's paid total and mirrors it onto
    /// the item. Nothing is written unless the outcome is `Recorded`.
    async fn record_payment(
        &self,
        request_id: Uuid,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> anyhow::Result<PaymentOutcome>;
}
