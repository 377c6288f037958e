use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;
use wingrow_core::{
    DomainError, DomainResult, InventoryItem, InventoryStore, StockDecrement,
    input::{coerced_price, truncated_stock},
};

pub const DEFAULT_CATALOG: [&str; 11] = [
    "Apron",
    "Cap",
    "Flex",
    "Tent Cloths",
    "Table",
    "Tent Structure",
    "Small Rate Board",
    "Jacket",
    "Big Rate Board",
    "Diary",
    "Marker",
];

/// Admin edit of an item. `qty` and `price` are accepted as legacy spellings
/// of `stock` and `unitPrice`; the canonical key wins when both are sent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPatch {
    pub stock: Option<Value>,
    pub qty: Option<Value>,
    pub unit_price: Option<Value>,
    pub price: Option<Value>,
}

impl ItemPatch {
    fn stock_value(&self) -> Option<&Value> {
        self.stock.as_ref().or(self.qty.as_ref())
    }

    fn price_value(&self) -> Option<&Value> {
        self.unit_price.as_ref().or(self.price.as_ref())
    }
}

/// Item catalog and stock counts.
#[derive(Clone)]
pub struct StockLedger {
    store: Arc<dyn InventoryStore>,
}

impl StockLedger {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self { store }
    }

    pub async fn list_items(&self) -> DomainResult<Vec<InventoryItem>> {
        Ok(self.store.list_items().await?)
    }

    pub async fn fetch_item(&self, item_id: Uuid) -> DomainResult<InventoryItem> {
        self.store
            .fetch_item(item_id)
            .await?
            .ok_or_else(item_not_found)
    }

    /// Insert-if-absent by name; existing items are left untouched.
    pub async fn seed_catalog(&self, names: &[&str]) -> DomainResult<Vec<InventoryItem>> {
        let now = Utc::now();
        let mut inserted = 0usize;
        for name in names.iter().map(|name| name.trim()).filter(|name| !name.is_empty()) {
            if self
                .store
                .insert_item_if_absent(&InventoryItem::catalog_entry(name, now))
                .await?
            {
                inserted += 1;
            }
        }

        info!(requested = names.len(), inserted, "inventory catalog seeded");
        self.list_items().await
    }

    pub async fn set_stock(&self, item_id: Uuid, raw_stock: &Value) -> DomainResult<InventoryItem> {
        let stock = truncated_stock(raw_stock)?;
        let item = self
            .store
            .set_stock(item_id, stock, Utc::now())
            .await?
            .ok_or_else(item_not_found)?;

        info!(%item_id, stock, "item stock set");
        Ok(item)
    }

    pub async fn set_price(&self, item_id: Uuid, raw_price: &Value) -> DomainResult<InventoryItem> {
        let unit_price = coerced_price(raw_price)?;
        let item = self
            .store
            .set_unit_price(item_id, unit_price, Utc::now())
            .await?
            .ok_or_else(item_not_found)?;

        info!(%item_id, %unit_price, "item price set");
        Ok(item)
    }

    /// Stock and price are validated before anything is written.
    pub async fn apply_patch(&self, item_id: Uuid, patch: &ItemPatch) -> DomainResult<InventoryItem> {
        if let Some(raw_stock) = patch.stock_value() {
            truncated_stock(raw_stock)?;
        }
        if let Some(raw_price) = patch.price_value() {
            coerced_price(raw_price)?;
        }

        let mut item = None;
        if let Some(raw_stock) = patch.stock_value() {
            item = Some(self.set_stock(item_id, raw_stock).await?);
        }
        if let Some(raw_price) = patch.price_value() {
            item = Some(self.set_price(item_id, raw_price).await?);
        }

        match item {
            Some(item) => Ok(item),
            None => self.fetch_item(item_id).await,
        }
    }

    pub async fn decrement_stock(&self, item_id: Uuid, qty: i64) -> DomainResult<InventoryItem> {
        if qty <= 0 {
            return Err(DomainError::validation("qty must be a positive integer"));
        }

        match self.store.decrement_stock(item_id, qty, Utc::now()).await? {
            StockDecrement::Applied(item) => {
                info!(%item_id, qty, remaining = item.stock, "stock decremented");
                Ok(item)
            }
            StockDecrement::Insufficient { available } => Err(DomainError::InsufficientStock {
                requested: qty,
                available,
            }),
            StockDecrement::Missing => Err(item_not_found()),
        }
    }
}

pub(crate) fn item_not_found() -> DomainError {
    DomainError::not_found("item not found")
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;
    use wingrow_store::MemoryStore;

    use super::*;

    fn ledger() -> StockLedger {
        StockLedger::new(Arc::new(MemoryStore::new()))
    }

    async fn seeded_item(ledger: &StockLedger, name: &str) -> InventoryItem {
        ledger
            .seed_catalog(&[name])
            .await
            .unwrap()
            .into_iter()
            .find(|item| item.name == name)
            .unwrap()
    }

    #[tokio::test]
    async fn seeding_is_idempotent_and_sorted() {
        let ledger = ledger();
        let tent = seeded_item(&ledger, "Tent").await;
        assert_eq!(tent.stock, 20);
        assert_eq!(tent.unit, "pcs");

        ledger.set_stock(tent.id, &json!(3)).await.unwrap();
        let items = ledger.seed_catalog(&["Tent", "Apron"]).await.unwrap();

        assert_eq!(
            items.iter().map(|item| item.name.as_str()).collect::<Vec<_>>(),
            vec!["Apron", "Tent"]
        );
        assert_eq!(items[1].stock, 3);
    }

    #[tokio::test]
    async fn default_catalog_seeds_every_item() {
        let ledger = ledger();
        let items = ledger.seed_catalog(&DEFAULT_CATALOG).await.unwrap();
        assert_eq!(items.len(), DEFAULT_CATALOG.len());
        assert!(items.iter().all(|item| item.stock == 20));
    }

    #[tokio::test]
    async fn set_stock_truncates_and_validates() {
        let ledger = ledger();
        let item = seeded_item(&ledger, "Cap").await;

        let updated = ledger.set_stock(item.id, &json!("7.9")).await.unwrap();
        assert_eq!(updated.stock, 7);

        assert!(matches!(
            ledger.set_stock(item.id, &json!(-2)).await,
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            ledger.set_stock(item.id, &json!("many")).await,
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            ledger.set_stock(Uuid::new_v4(), &json!(1)).await,
            Err(DomainError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn set_price_coerces_to_non_negative() {
        let ledger = ledger();
        let item = seeded_item(&ledger, "Flex").await;

        let priced = ledger.set_price(item.id, &json!("12.50")).await.unwrap();
        assert_eq!(priced.unit_price, Decimal::new(1250, 2));

        let clamped = ledger.set_price(item.id, &json!(-1)).await.unwrap();
        assert_eq!(clamped.unit_price, Decimal::ZERO);

        assert!(matches!(
            ledger.set_price(Uuid::new_v4(), &json!(1)).await,
            Err(DomainError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn patch_accepts_legacy_keys_and_validates_first() {
        let ledger = ledger();
        let item = seeded_item(&ledger, "Diary").await;

        let patch: ItemPatch = serde_json::from_value(json!({ "qty": 4, "price": 2 })).unwrap();
        let updated = ledger.apply_patch(item.id, &patch).await.unwrap();
        assert_eq!(updated.stock, 4);
        assert_eq!(updated.unit_price, Decimal::from(2));

        let patch: ItemPatch =
            serde_json::from_value(json!({ "stock": 9, "qty": 1, "unitPrice": 5 })).unwrap();
        let updated = ledger.apply_patch(item.id, &patch).await.unwrap();
        assert_eq!(updated.stock, 9);
        assert_eq!(updated.unit_price, Decimal::from(5));

        let bad: ItemPatch =
            serde_json::from_value(json!({ "stock": "x", "unitPrice": 99 })).unwrap();
        assert!(ledger.apply_patch(item.id, &bad).await.is_err());
        assert_eq!(ledger.fetch_item(item.id).await.unwrap().unit_price, Decimal::from(5));

        let huge_price: ItemPatch = serde_json::from_value(
            json!({ "stock": 1, "unitPrice": "70000000000000000000000000000" }),
        )
        .unwrap();
        assert!(matches!(
            ledger.apply_patch(item.id, &huge_price).await,
            Err(DomainError::Validation(_))
        ));
        let untouched = ledger.fetch_item(item.id).await.unwrap();
        assert_eq!(untouched.stock, 9);
        assert_eq!(untouched.unit_price, Decimal::from(5));
    }

    #[tokio::test]
    async fn decrement_rejects_overdraw() {
        let ledger = ledger();
        let item = seeded_item(&ledger, "Marker").await;

        assert_eq!(ledger.decrement_stock(item.id, 15).await.unwrap().stock, 5);
        assert!(matches!(
            ledger.decrement_stock(item.id, 6).await,
            Err(DomainError::InsufficientStock {
                requested: 6,
                available: 5
            })
        ));
        assert_eq!(ledger.fetch_item(item.id).await.unwrap().stock, 5);
    }
}
