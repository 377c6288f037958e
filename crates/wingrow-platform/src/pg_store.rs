use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow, types::Json};
use tracing::debug;
use uuid::Uuid;
use wingrow_core::{
    ApprovalCommand, ApprovalOutcome, Claim, ClaimFilter, ClaimItem, ClaimStatus, ClaimStore,
    Decision, InventoryItem, InventoryStore, IssueRequest, PaymentOutcome, RequestFilter,
    RequestStatus, SortOrder, StockDecrement, totals,
};

const CLAIM_COLUMNS: &str = "id, owner_id, status, items, total_amount, approved_by, decided_at, \
     manager_comment, payment_ref, paid_at, version, created_at, updated_at";

const ITEM_COLUMNS: &str =
    "id, name, unit, stock, unit_price, total_cost, amount_paid, created_at, updated_at";

const REQUEST_COLUMNS: &str = "id, requested_by, item_id, item_name, qty, note, status, \
     issued_qty, unit_price, total_cost, amount_paid, decided_by, decided_at, decision_note, \
     created_at, updated_at";

/// Postgres-backed store. Stock and status transitions are conditional
/// `UPDATE`s; approvals and payments run in a single transaction.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn draft_row(&self, owner_id: &str) -> Result<Option<Claim>> {
        let sql = format!(
            "SELECT {CLAIM_COLUMNS} FROM claims WHERE owner_id = $1 AND status = 'DRAFT'"
        );
        let row = sqlx::query(&sql)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(claim_from_row).transpose()
    }
}

#[async_trait]
impl ClaimStore for PgStore {
    async fn draft_for_owner(&self, owner_id: &str, now: DateTime<Utc>) -> Result<Claim> {
        // A concurrent submit can move the draft out between insert and
        // select; retrying then creates a fresh one.
        for _ in 0..3 {
            let draft = Claim::new_draft(owner_id, now);
            let inserted = sqlx::query(
                r#"
                INSERT INTO claims (
                    id,
                    owner_id,
                    status,
                    items,
                    total_amount,
                    manager_comment,
                    payment_ref,
                    version,
                    created_at,
                    updated_at
                )
                VALUES ($1, $2, 'DRAFT', $3, $4, '', '', 0, $5, $5)
                ON CONFLICT (owner_id) WHERE status = 'DRAFT' DO NOTHING
                "#,
            )
            .bind(draft.id)
            .bind(owner_id)
            .bind(Json(&draft.items))
            .bind(draft.total_amount)
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();

            if inserted == 1 {
                debug!(claim_id = %draft.id, owner_id, "draft claim inserted");
                return Ok(draft);
            }
            if let Some(existing) = self.draft_row(owner_id).await? {
                return Ok(existing);
            }
        }

        anyhow::bail!("could not resolve draft claim for owner {owner_id}")
    }

    async fn fetch(&self, claim_id: Uuid) -> Result<Option<Claim>> {
        let sql = format!("SELECT {CLAIM_COLUMNS} FROM claims WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(claim_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(claim_from_row).transpose()
    }

    async fn replace(&self, claim: &Claim, expected_version: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE claims
            SET
                status = $3,
                items = $4,
                total_amount = $5,
                approved_by = $6,
                decided_at = $7,
                manager_comment = $8,
                payment_ref = $9,
                paid_at = $10,
                updated_at = $11,
                version = version + 1
            WHERE id = $1
              AND version = $2
            "#,
        )
        .bind(claim.id)
        .bind(expected_version)
        .bind(claim.status.as_str())
        .bind(Json(&claim.items))
        .bind(claim.total_amount)
        .bind(claim.approved_by.as_deref())
        .bind(claim.decided_at)
        .bind(&claim.manager_comment)
        .bind(&claim.payment_ref)
        .bind(claim.paid_at)
        .bind(claim.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn list(&self, filter: &ClaimFilter) -> Result<Vec<Claim>> {
        let direction = match filter.order {
            SortOrder::NewestFirst => "DESC",
            SortOrder::OldestFirst => "ASC",
        };
        let sql = format!(
            "SELECT {CLAIM_COLUMNS} FROM claims \
             WHERE ($1::text IS NULL OR owner_id = $1) \
               AND (cardinality($2::text[]) = 0 OR status = ANY($2)) \
             ORDER BY created_at {direction}, id {direction}"
        );
        let statuses: Vec<String> = filter
            .statuses
            .iter()
            .map(|status| status.as_str().to_string())
            .collect();

        let rows = sqlx::query(&sql)
            .bind(filter.owner_id.as_deref())
            .bind(statuses)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(claim_from_row).collect()
    }
}

#[async_trait]
impl InventoryStore for PgStore {
    async fn list_items(&self) -> Result<Vec<InventoryItem>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM inventory_items ORDER BY name ASC");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(item_from_row).collect()
    }

    async fn insert_item_if_absent(&self, item: &InventoryItem) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO inventory_items (
                id,
                name,
                unit,
                stock,
                unit_price,
                total_cost,
                amount_paid,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(item.id)
        .bind(&item.name)
        .bind(&item.unit)
        .bind(item.stock)
        .bind(item.unit_price)
        .bind(item.total_cost)
        .bind(item.amount_paid)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn fetch_item(&self, item_id: Uuid) -> Result<Option<InventoryItem>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM inventory_items WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(item_from_row).transpose()
    }

    async fn set_stock(
        &self,
        item_id: Uuid,
        stock: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<InventoryItem>> {
        anyhow::ensure!(stock >= 0, "stock must not be negative");
        let sql = format!(
            "UPDATE inventory_items SET stock = $2, updated_at = $3 \
             WHERE id = $1 RETURNING {ITEM_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(item_id)
            .bind(stock)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(item_from_row).transpose()
    }

    async fn set_unit_price(
        &self,
        item_id: Uuid,
        unit_price: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Option<InventoryItem>> {
        let sql = format!(
            "UPDATE inventory_items SET unit_price = $2, updated_at = $3 \
             WHERE id = $1 RETURNING {ITEM_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(item_id)
            .bind(unit_price)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(item_from_row).transpose()
    }

    async fn decrement_stock(
        &self,
        item_id: Uuid,
        qty: i64,
        now: DateTime<Utc>,
    ) -> Result<StockDecrement> {
        let mut tx = self.pool.begin().await?;
        let outcome = decrement_in(&mut tx, item_id, qty, now).await?;
        if matches!(outcome, StockDecrement::Applied(_)) {
            tx.commit().await?;
        }
        Ok(outcome)
    }

    async fn insert_request(&self, request: &IssueRequest) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO issue_requests (
                id,
                requested_by,
                item_id,
                item_name,
                qty,
                note,
                status,
                issued_qty,
                unit_price,
                total_cost,
                amount_paid,
                decided_by,
                decided_at,
                decision_note,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(request.id)
        .bind(&request.requested_by)
        .bind(request.item_id)
        .bind(&request.item_name)
        .bind(request.qty)
        .bind(&request.note)
        .bind(request.status.as_str())
        .bind(request.issued_qty)
        .bind(request.unit_price)
        .bind(request.total_cost)
        .bind(request.amount_paid)
        .bind(request.decided_by.as_deref())
        .bind(request.decided_at)
        .bind(&request.decision_note)
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fetch_request(&self, request_id: Uuid) -> Result<Option<IssueRequest>> {
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM issue_requests WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(request_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(request_from_row).transpose()
    }

    async fn list_requests(&self, filter: &RequestFilter) -> Result<Vec<IssueRequest>> {
        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM issue_requests \
             WHERE ($1::text IS NULL OR requested_by = $1) \
               AND ($2::text IS NULL OR status = $2) \
             ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(filter.requested_by.as_deref())
            .bind(filter.status.map(|status| status.as_str()))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(request_from_row).collect()
    }

    async fn approve_request(&self, command: &ApprovalCommand) -> Result<ApprovalOutcome> {
        let mut tx = self.pool.begin().await?;

        let locked = sqlx::query(
            r#"
            SELECT item_id, status
            FROM issue_requests
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(command.request_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(locked) = locked else {
            return Ok(ApprovalOutcome::RequestMissing);
        };
        let status: String = locked.try_get("status")?;
        if status.parse::<RequestStatus>()? != RequestStatus::Pending {
            return Ok(ApprovalOutcome::NotPending);
        }
        let item_id: Uuid = locked.try_get("item_id")?;

        let Some(item) = lock_item(&mut tx, item_id).await? else {
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

        let decision = &command.decision;
        let item_sql = format!(
            "UPDATE inventory_items SET stock = stock - $2, total_cost = $3, updated_at = $4 \
             WHERE id = $1 RETURNING {ITEM_COLUMNS}"
        );
        let item_row = sqlx::query(&item_sql)
            .bind(item_id)
            .bind(command.issued_qty)
            .bind(item_total)
            .bind(decision.decided_at)
            .fetch_one(&mut *tx)
            .await?;

        let request_sql = format!(
            "UPDATE issue_requests SET \
                 status = 'APPROVED', \
                 issued_qty = $2, \
                 unit_price = $3, \
                 total_cost = $4, \
                 decided_by = $5, \
                 decided_at = $6, \
                 decision_note = COALESCE($7, decision_note), \
                 updated_at = $6 \
             WHERE id = $1 RETURNING {REQUEST_COLUMNS}"
        );
        let request_row = sqlx::query(&request_sql)
            .bind(command.request_id)
            .bind(command.issued_qty)
            .bind(item.unit_price)
            .bind(total_cost)
            .bind(&decision.decided_by)
            .bind(decision.decided_at)
            .bind(decision.note.as_deref())
            .fetch_one(&mut *tx)
            .await?;

        let outcome = ApprovalOutcome::Approved {
            request: request_from_row(&request_row)?,
            item: item_from_row(&item_row)?,
        };
        tx.commit().await?;
        Ok(outcome)
    }

    async fn reject_request(
        &self,
        request_id: Uuid,
        decision: &Decision,
    ) -> Result<Option<IssueRequest>> {
        let sql = format!(
            "UPDATE issue_requests SET \
                 status = 'REJECTED', \
                 decided_by = $2, \
                 decided_at = $3, \
                 decision_note = COALESCE($4, decision_note), \
                 updated_at = $3 \
             WHERE id = $1 AND status = 'PENDING' RETURNING {REQUEST_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(request_id)
            .bind(&decision.decided_by)
            .bind(decision.decided_at)
            .bind(decision.note.as_deref())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(request_from_row).transpose()
    }

    async fn record_payment(
        &self,
        request_id: Uuid,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<PaymentOutcome> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {REQUEST_COLUMNS} FROM issue_requests WHERE id = $1 FOR UPDATE");
        let Some(row) = sqlx::query(&sql)
            .bind(request_id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(PaymentOutcome::RequestMissing);
        };
        let request = request_from_row(&row)?;
        if request.status != RequestStatus::Approved {
            return Ok(PaymentOutcome::NotApproved);
        }

        let item = lock_item(&mut tx, request.item_id).await?;
        let Some(request_paid) = totals::checked_money_add(request.amount_paid, amount) else {
            return Ok(PaymentOutcome::AmountOutOfRange);
        };
        let item_paid = match &item {
            Some(item) => match totals::checked_money_add(item.amount_paid, amount) {
                Some(paid) => Some(paid),
                None => return Ok(PaymentOutcome::AmountOutOfRange),
            },
            None => None,
        };

        let sql = format!(
            "UPDATE issue_requests SET amount_paid = $2, updated_at = $3 \
             WHERE id = $1 RETURNING {REQUEST_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(request_id)
            .bind(request_paid)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;
        let request = request_from_row(&row)?;

        if let Some(paid) = item_paid {
            sqlx::query(
                r#"
                UPDATE inventory_items
                SET amount_paid = $2,
                    updated_at = $3
                WHERE id = $1
                "#,
            )
            .bind(request.item_id)
            .bind(paid)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(PaymentOutcome::Recorded(request))
    }
}

async fn lock_item(
    tx: &mut Transaction<'_, Postgres>,
    item_id: Uuid,
) -> Result<Option<InventoryItem>> {
    let sql = format!("SELECT {ITEM_COLUMNS} FROM inventory_items WHERE id = $1 FOR UPDATE");
    let row = sqlx::query(&sql)
        .bind(item_id)
        .fetch_optional(&mut **tx)
        .await?;
    row.as_ref().map(item_from_row).transpose()
}

async fn decrement_in(
    tx: &mut Transaction<'_, Postgres>,
    item_id: Uuid,
    qty: i64,
    now: DateTime<Utc>,
) -> Result<StockDecrement> {
    let sql = format!(
        "UPDATE inventory_items SET stock = stock - $2, updated_at = $3 \
         WHERE id = $1 AND $2 > 0 AND stock >= $2 RETURNING {ITEM_COLUMNS}"
    );
    let applied = sqlx::query(&sql)
        .bind(item_id)
        .bind(qty)
        .bind(now)
        .fetch_optional(&mut **tx)
        .await?;
    if let Some(row) = applied {
        return Ok(StockDecrement::Applied(item_from_row(&row)?));
    }

    let available = sqlx::query("SELECT stock FROM inventory_items WHERE id = $1")
        .bind(item_id)
        .fetch_optional(&mut **tx)
        .await?;
    match available {
        Some(row) => Ok(StockDecrement::Insufficient {
            available: row.try_get("stock")?,
        }),
        None => Ok(StockDecrement::Missing),
    }
}

fn claim_from_row(row: &PgRow) -> Result<Claim> {
    let status: String = row.try_get("status")?;
    let items: Json<Vec<ClaimItem>> = row.try_get("items")?;

    Ok(Claim {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        status: status.parse::<ClaimStatus>()?,
        items: items.0,
        total_amount: row.try_get("total_amount")?,
        approved_by: row.try_get("approved_by")?,
        decided_at: row.try_get("decided_at")?,
        manager_comment: row.try_get("manager_comment")?,
        payment_ref: row.try_get("payment_ref")?,
        paid_at: row.try_get("paid_at")?,
        version: row.try_get("version")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn item_from_row(row: &PgRow) -> Result<InventoryItem> {
    Ok(InventoryItem {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        unit: row.try_get("unit")?,
        stock: row.try_get("stock")?,
        unit_price: row.try_get("unit_price")?,
        total_cost: row.try_get("total_cost")?,
        amount_paid: row.try_get("amount_paid")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn request_from_row(row: &PgRow) -> Result<IssueRequest> {
    let status: String = row.try_get("status")?;

    Ok(IssueRequest {
        id: row.try_get("id")?,
        requested_by: row.try_get("requested_by")?,
        item_id: row.try_get("item_id")?,
        item_name: row.try_get("item_name")?,
        qty: row.try_get("qty")?,
        note: row.try_get("note")?,
        status: status.parse::<RequestStatus>()?,
        issued_qty: row.try_get("issued_qty")?,
        unit_price: row.try_get("unit_price")?,
        total_cost: row.try_get("total_cost")?,
        amount_paid: row.try_get("amount_paid")?,
        decided_by: row.try_get("decided_by")?,
        decided_at: row.try_get("decided_at")?,
        decision_note: row.try_get("decision_note")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
