use std::{sync::Arc, time::Duration};

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;
use wingrow_core::{
    CallerContext, Claim, ClaimFilter, ClaimItem, ClaimStatus, ClaimStore, DomainError,
    DomainResult, SortOrder,
    input::{parse_item_date, positive_amount},
    models::DEFAULT_ITEM_CATEGORY,
    totals,
};

/// Upper bound on the pause between claim write retries.
const MAX_RETRY_PAUSE: Duration = Duration::from_millis(8);

/// Statuses accepted as a list filter.
const LISTABLE_STATUSES: [ClaimStatus; 4] = [
    ClaimStatus::Submitted,
    ClaimStatus::Approved,
    ClaimStatus::Rejected,
    ClaimStatus::Paid,
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimItemInput {
    pub date: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub amount: Value,
    pub notes: Option<String>,
    pub receipt_url: Option<String>,
}

impl ClaimItemInput {
    fn into_item(self) -> DomainResult<ClaimItem> {
        let raw_date = self
            .date
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| DomainError::validation("valid date and amount required"))?;
        let amount = positive_amount(&self.amount, "amount")?;
        let date = parse_item_date(raw_date)?;

        let category = self
            .category
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_ITEM_CATEGORY)
            .to_string();

        Ok(ClaimItem {
            date,
            category,
            amount,
            notes: self.notes.unwrap_or_default().trim().to_string(),
            receipt_url: self.receipt_url.unwrap_or_default().trim().to_string(),
        })
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ItemsSnapshot {
    pub items: Vec<ClaimItem>,
    pub total_amount: Decimal,
}

impl From<Claim> for ItemsSnapshot {
    fn from(claim: Claim) -> Self {
        Self {
            items: claim.items,
            total_amount: claim.total_amount,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimDecision {
    Approve,
    Reject,
}

/// Owns claim documents and every claim status transition.
#[derive(Clone)]
pub struct ClaimService {
    store: Arc<dyn ClaimStore>,
}

impl ClaimService {
    pub fn new(store: Arc<dyn ClaimStore>) -> Self {
        Self { store }
    }

    pub async fn get_or_create_draft(&self, owner_id: &str) -> DomainResult<Uuid> {
        let draft = self.store.draft_for_owner(owner_id, Utc::now()).await?;
        Ok(draft.id)
    }

    pub async fn add_item(
        &self,
        claim_id: Uuid,
        owner_id: &str,
        input: ClaimItemInput,
    ) -> DomainResult<ItemsSnapshot> {
        let item = input.into_item()?;
        let claim = self
            .update_draft(claim_id, owner_id, |claim| {
                claim.items.push(item.clone());
                Ok(())
            })
            .await?;
        Ok(claim.into())
    }

    /// The raw index is only interpreted once the caller's draft is found, so
    /// a bad index on someone else's claim is still NotFound.
    pub async fn remove_item(
        &self,
        claim_id: Uuid,
        owner_id: &str,
        index: &str,
    ) -> DomainResult<ItemsSnapshot> {
        let claim = self
            .update_draft(claim_id, owner_id, |claim| {
                let position = index
                    .trim()
                    .parse::<usize>()
                    .ok()
                    .filter(|position| *position < claim.items.len())
                    .ok_or_else(|| DomainError::validation("invalid item index"))?;
                claim.items.remove(position);
                Ok(())
            })
            .await?;
        Ok(claim.into())
    }

    pub async fn submit(&self, claim_id: Uuid, owner_id: &str) -> DomainResult<Claim> {
        let claim = self
            .update_draft(claim_id, owner_id, |claim| {
                if claim.items.is_empty() {
                    return Err(DomainError::validation("no items to submit"));
                }
                claim.status = ClaimStatus::Submitted;
                Ok(())
            })
            .await?;

        info!(%claim_id, owner_id, total = %claim.total_amount, "claim submitted");
        Ok(claim)
    }

    /// The role gate runs first; an absent claim is then NotFound.
    pub async fn decide(
        &self,
        claim_id: Uuid,
        caller: &CallerContext,
        decision: ClaimDecision,
        comment: Option<String>,
    ) -> DomainResult<Claim> {
        caller.require_manager()?;
        let comment = comment.unwrap_or_default().trim().to_string();

        let claim = self
            .update(claim_id, |claim| {
                if claim.status != ClaimStatus::Submitted {
                    return Err(DomainError::invalid_state(format!(
                        "claim is {}, not SUBMITTED",
                        claim.status
                    )));
                }
                claim.status = match decision {
                    ClaimDecision::Approve => ClaimStatus::Approved,
                    ClaimDecision::Reject => ClaimStatus::Rejected,
                };
                claim.approved_by = Some(caller.user_id.clone());
                claim.decided_at = Some(Utc::now());
                claim.manager_comment = comment.clone();
                Ok(true)
            })
            .await?;

        info!(%claim_id, manager = %caller.user_id, status = %claim.status, "claim decided");
        Ok(claim)
    }

    /// Re-marking a PAID claim returns it unchanged.
    pub async fn mark_paid(
        &self,
        claim_id: Uuid,
        caller: &CallerContext,
        payment_ref: Option<String>,
    ) -> DomainResult<Claim> {
        caller.require_manager()?;
        let payment_ref = payment_ref.unwrap_or_default().trim().to_string();

        let claim = self
            .update(claim_id, |claim| {
                let current = claim.status;
                match current {
                    ClaimStatus::Paid => Ok(false),
                    ClaimStatus::Approved => {
                        claim.status = ClaimStatus::Paid;
                        claim.paid_at = Some(Utc::now());
                        if !payment_ref.is_empty() {
                            claim.payment_ref = payment_ref.clone();
                        }
                        Ok(true)
                    }
                    other => Err(DomainError::invalid_state(format!(
                        "only approved claims can be marked paid (claim is {other})"
                    ))),
                }
            })
            .await?;

        info!(
            %claim_id,
            manager = %caller.user_id,
            payment_ref = %claim.payment_ref,
            "claim paid"
        );
        Ok(claim)
    }

    pub async fn list(&self, filter: &ClaimFilter) -> DomainResult<Vec<Claim>> {
        Ok(self.store.list(filter).await?)
    }

    /// Non-managers only ever see their own claims; managers see everyone's
    /// unless `mine` is set.
    pub async fn list_visible(
        &self,
        caller: &CallerContext,
        mine: bool,
        status: Option<&str>,
    ) -> DomainResult<Vec<Claim>> {
        let owner_id = (mine || !caller.is_manager()).then(|| caller.user_id.clone());
        let filter = ClaimFilter {
            owner_id,
            statuses: status_bucket(status)?,
            order: SortOrder::NewestFirst,
        };
        self.list(&filter).await
    }

    /// Manager view by status; defaults to the SUBMITTED queue, oldest first.
    pub async fn approvals(
        &self,
        caller: &CallerContext,
        status: Option<&str>,
    ) -> DomainResult<Vec<Claim>> {
        caller.require_manager()?;
        let status = match status.map(str::trim).filter(|value| !value.is_empty()) {
            Some(raw) => listable_status(raw)?,
            None => ClaimStatus::Submitted,
        };
        let order = if status == ClaimStatus::Submitted {
            SortOrder::OldestFirst
        } else {
            SortOrder::NewestFirst
        };

        self.list(&ClaimFilter {
            owner_id: None,
            statuses: status.query_bucket(),
            order,
        })
        .await
    }

    pub async fn pending_approvals(&self, caller: &CallerContext) -> DomainResult<Vec<Claim>> {
        self.approvals(caller, None).await
    }

    pub async fn get_one(&self, claim_id: Uuid, caller: &CallerContext) -> DomainResult<Claim> {
        let claim = self
            .store
            .fetch(claim_id)
            .await?
            .ok_or_else(|| DomainError::not_found("claim not found"))?;

        if !caller.is_manager() && claim.owner_id != caller.user_id {
            return Err(DomainError::forbidden("claim belongs to another organizer"));
        }
        Ok(claim)
    }

    async fn update_draft<F>(
        &self,
        claim_id: Uuid,
        owner_id: &str,
        mut apply: F,
    ) -> DomainResult<Claim>
    where
        F: FnMut(&mut Claim) -> DomainResult<()>,
    {
        self.update(claim_id, |claim| {
            if !claim.is_draft_of(owner_id) {
                return Err(draft_not_found());
            }
            apply(claim)?;
            Ok(true)
        })
        .await
        .map_err(|err| match err {
            DomainError::NotFound(_) => draft_not_found(),
            other => other,
        })
    }

    /// Fetch, mutate and conditionally replace, retrying when another writer
    /// got there first. `apply` returns `false` to skip the write.
    ///
    /// A lost race means some other write landed, so every contender
    /// eventually wins; the loop backs off instead of giving up.
    async fn update<F>(&self, claim_id: Uuid, mut apply: F) -> DomainResult<Claim>
    where
        F: FnMut(&mut Claim) -> DomainResult<bool>,
    {
        let mut pause = Duration::from_micros(50);
        let mut attempt = 0u64;
        loop {
            attempt += 1;
            let mut claim = self
                .store
                .fetch(claim_id)
                .await?
                .ok_or_else(|| DomainError::not_found("claim not found"))?;
            let expected_version = claim.version;

            if !apply(&mut claim)? {
                return Ok(claim);
            }
            claim.recompute_total()?;
            claim.updated_at = Utc::now();

            if self.store.replace(&claim, expected_version).await? {
                claim.version = expected_version + 1;
                return Ok(claim);
            }
            debug!(%claim_id, attempt, "claim write lost a race, retrying");
            tokio::time::sleep(pause).await;
            pause = (pause * 2).min(MAX_RETRY_PAUSE);
        }
    }
}

fn draft_not_found() -> DomainError {
    DomainError::not_found("draft claim not found")
}

fn listable_status(raw: &str) -> DomainResult<ClaimStatus> {
    let status: ClaimStatus = raw.parse()?;
    if LISTABLE_STATUSES.contains(&status) {
        Ok(status)
    } else {
        Err(DomainError::validation(format!("invalid status '{raw}'")))
    }
}

fn status_bucket(status: Option<&str>) -> DomainResult<Vec<ClaimStatus>> {
    match status.map(str::trim).filter(|value| !value.is_empty()) {
        Some(raw) => Ok(listable_status(raw)?.query_bucket()),
        None => Ok(Vec::new()),
    }
}
