use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;
use wingrow_core::{
    ApprovalCommand, ApprovalOutcome, Claim, ClaimFilter, ClaimStatus, ClaimStore, Decision,
    InventoryItem, InventoryStore, IssueRequest, PaymentOutcome, RequestFilter, RequestStatus,
    SortOrder, StockDecrement, totals,
};

/// In-process document store.
///
/// Items and requests share one lock so an approval observes and updates
/// both atomically.
#[derive(Default)]
pub struct MemoryStore {
    claims: RwLock<HashMap<Uuid, Claim>>,
    inventory: RwLock<InventoryTables>,
}

#[derive(Default)]
struct InventoryTables {
    items: HashMap<Uuid, InventoryItem>,
    requests: HashMap<Uuid, IssueRequest>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClaimStore for MemoryStore {
    async fn draft_for_owner(&self, owner_id: &str, now: DateTime<Utc>) -> anyhow::Result<Claim> {
        let mut claims = self.claims.write().await;
        if let Some(existing) = claims.values().find(|claim| claim.is_draft_of(owner_id)) {
            return Ok(existing.clone());
        }

        let draft = Claim::new_draft(owner_id, now);
        claims.insert(draft.id, draft.clone());
        Ok(draft)
    }

    async fn fetch(&self, claim_id: Uuid) -> anyhow::Result<Option<Claim>> {
        let claims = self.claims.read().await;
        Ok(claims.get(&claim_id).cloned())
    }

    async fn replace(&self, claim: &Claim, expected_version: i64) -> anyhow::Result<bool> {
        let mut claims = self.claims.write().await;
        let Some(stored) = claims.get_mut(&claim.id) else {
            return Ok(false);
        };
        if stored.version != expected_version {
            return Ok(false);
        }

        *stored = Claim {
            version: expected_version + 1,
            ..claim.clone()
        };
        Ok(true)
    }

    async fn list(&self, filter: &ClaimFilter) -> anyhow::Result<Vec<Claim>> {
        let claims = self.claims.read().await;
        let mut matched: Vec<Claim> = claims
            .values()
            .filter(|claim| filter.matches(claim))
            .cloned()
            .collect();

        match filter.order {
            SortOrder::NewestFirst => matched.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            SortOrder::OldestFirst => matched.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        }
        Ok(matched)
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn list_items(&self) -> anyhow::Result<Vec<InventoryItem>> {
        let tables = self.inventory.read().await;
        let mut items: Vec<InventoryItem> = tables.items.values().cloned().collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    async fn insert_item_if_absent(&self, item: &InventoryItem) -> anyhow::Result<bool> {
        let mut tables = self.inventory.write().await;
        if tables.items.values().any(|existing| existing.name == item.name) {
            return Ok(false);
        }
        tables.items.insert(item.id, item.clone());
        Ok(true)
    }

    async fn fetch_item(&self, item_id: Uuid) -> anyhow::Result<Option<InventoryItem>> {
        let tables = self.inventory.read().await;
        Ok(tables.items.get(&item_id).cloned())
    }

    async fn set_stock(
        &self,
        item_id: Uuid,
        stock: i64,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<InventoryItem>> {
        anyhow::ensure!(stock >= 0, "stock must not be negative");
        let mut tables = self.inventory.write().await;
        Ok(tables.items.get_mut(&item_id).map(|item| {
            item.stock = stock;
            item.updated_at = now;
            item.clone()
        }))
    }

    async fn set_unit_price(
        &self,
        item_id: Uuid,
        unit_price: Decimal,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<InventoryItem>> {
        let mut tables = self.inventory.write().await;
        Ok(tables.items.get_mut(&item_id).map(|item| {
            item.unit_price = unit_price;
            item.updated_at = now;
            item.clone()
        }))
    }

    async fn decrement_stock(
        &self,
        item_id: Uuid,
        qty: i64,
        now: DateTime<Utc>,
    ) -> anyhow::Result<StockDecrement> {
        let mut tables = self.inventory.write().await;
        Ok(apply_decrement(&mut tables.items, item_id, qty, now))
    }

    async fn insert_request(&self, request: &IssueRequest) -> anyhow::Result<()> {
        let mut tables = self.inventory.write().await;
        tables.requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn fetch_request(&self, request_id: Uuid) -> anyhow::Result<Option<IssueRequest>> {
        let tables = self.inventory.read().await;
        Ok(tables.requests.get(&request_id).cloned())
    }

    async fn list_requests(&self, filter: &RequestFilter) -> anyhow::Result<Vec<IssueRequest>> {
        let tables = self.inventory.read().await;
        let mut matched: Vec<IssueRequest> = tables
            .requests
            .values()
            .filter(|request| filter.matches(request))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matched)
    }

    async fn approve_request(&self, command: &ApprovalCommand) -> anyhow::Result<ApprovalOutcome> {
        let mut tables = self.inventory.write().await;
        let InventoryTables { items, requests } = &mut *tables;

        let Some(request) = requests.get_mut(&command.request_id) else {
            return Ok(ApprovalOutcome::RequestMissing);
        };
        if request.status != RequestStatus::Pending {
            return Ok(ApprovalOutcome::NotPending);
        }
        let Some(item) = items.get_mut(&request.item_id) else {
            return Ok(ApprovalOutcome::ItemMissing);
        };
        if command.issued_qty <= 0 || item.stock < command.issued_qty {
            return Ok(ApprovalOutcome::InsufficientStock {
                available: item.stock,
            });
        }

        let Some((total_cost, item_total)) =
            totals::issue_total_cost(command.issued_qty, item.unit_price).and_then(|cost| {
                totals::checked_money_add(item.total_cost, cost).map(|sum| (cost, sum))
            })
        else {
            return Ok(ApprovalOutcome::TotalOutOfRange);
        };

        let now = command.decision.decided_at;
        item.stock -= command.issued_qty;
        item.total_cost = item_total;
        item.updated_at = now;

        request.status = RequestStatus::Approved;
        request.issued_qty = Some(command.issued_qty);
        request.unit_price = Some(item.unit_price);
        request.total_cost = total_cost;
        request.decided_by = Some(command.decision.decided_by.clone());
        request.decided_at = Some(now);
        if let Some(note) = &command.decision.note {
            request.decision_note = note.clone();
        }
        request.updated_at = now;

        Ok(ApprovalOutcome::Approved {
            request: request.clone(),
            item: item.clone(),
        })
    }

    async fn reject_request(
        &self,
        request_id: Uuid,
        decision: &Decision,
    ) -> anyhow::Result<Option<IssueRequest>> {
        let mut tables = self.inventory.write().await;
        let Some(request) = tables.requests.get_mut(&request_id) else {
            return Ok(None);
        };
        if request.status != RequestStatus::Pending {
            return Ok(None);
        }

        request.status = RequestStatus::Rejected;
        request.decided_by = Some(decision.decided_by.clone());
        request.decided_at = Some(decision.decided_at);
        if let Some(note) = &decision.note {
            request.decision_note = note.clone();
        }
        request.updated_at = decision.decided_at;
        Ok(Some(request.clone()))
    }

    async fn record_payment(
        &self,
        request_id: Uuid,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> anyhow::Result<PaymentOutcome> {
        let mut tables = self.inventory.write().await;
        let InventoryTables { items, requests } = &mut *tables;

        let Some(request) = requests.get_mut(&request_id) else {
            return Ok(PaymentOutcome::RequestMissing);
        };
        if request.status != RequestStatus::Approved {
            return Ok(PaymentOutcome::NotApproved);
        }

        let mut item = items.get_mut(&request.item_id);
        let Some(request_paid) = totals::checked_money_add(request.amount_paid, amount) else {
            return Ok(PaymentOutcome::AmountOutOfRange);
        };
        let item_paid = match item.as_deref() {
            Some(item) => match totals::checked_money_add(item.amount_paid, amount) {
                Some(paid) => Some(paid),
                None => return Ok(PaymentOutcome::AmountOutOfRange),
            },
            None => None,
        };

        request.amount_paid = request_paid;
        request.updated_at = now;
        if let (Some(item), Some(paid)) = (item.as_deref_mut(), item_paid) {
            item.amount_paid = paid;
            item.updated_at = now;
        }
        Ok(PaymentOutcome::Recorded(request.clone()))
    }
}

fn apply_decrement(
    items: &mut HashMap<Uuid, InventoryItem>,
    item_id: Uuid,
    qty: i64,
    now: DateTime<Utc>,
) -> StockDecrement {
    let Some(item) = items.get_mut(&item_id) else {
        return StockDecrement::Missing;
    };
    if qty <= 0 || item.stock < qty {
        return StockDecrement::Insufficient {
            available: item.stock,
        };
    }

    item.stock -= qty;
    item.updated_at = now;
    StockDecrement::Applied(item.clone())
}
