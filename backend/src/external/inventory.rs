//! Inventory counter adapter
//!
//! Sales order creation reserves stock by raising the on-demand counter of each
//! line's item at the issue warehouse. The ledger itself lives in an external
//! inventory service; this module only exposes the narrow contract the workflow
//! needs, an HTTP client for the real service and an in-memory ledger.
//!
//! Every adjustment carries a key. The ledger applies an increase at most once
//! per key, and a decrease under the same key reverses exactly that increase,
//! or does nothing if the increase never landed. This lets the caller undo an
//! increase whose outcome it could not observe.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{ItemId, WarehouseId};
use tokio::sync::Mutex;

use crate::config::InventoryConfig;
use crate::error::{AppError, AppResult};

/// One keyed change of an item's on-demand quantity at a warehouse
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OnDemandAdjustment {
    pub key: String,
    pub warehouse_id: WarehouseId,
    pub item_id: ItemId,
    pub quantity: Decimal,
}

/// On-demand counter of an external inventory ledger
#[async_trait]
pub trait InventoryCounter: Send + Sync {
    /// Raise the on-demand quantity; repeating a key has no further effect
    async fn increase_on_demand(&self, adjustment: &OnDemandAdjustment) -> AppResult<()>;

    /// Reverse the increase made under the same key, if it was applied
    async fn decrease_on_demand(&self, adjustment: &OnDemandAdjustment) -> AppResult<()>;
}

// ============================================================================
// HTTP client
// ============================================================================

/// Client for the inventory ledger service
#[derive(Clone)]
pub struct InventoryClient {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct AdjustmentRequest<'a> {
    reservation_key: &'a str,
    quantity: Decimal,
}

impl InventoryClient {
    pub fn new(config: &InventoryConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration(format!("Inventory client: {}", e)))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create a client with a custom base URL and default timeouts (for testing)
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url,
        }
    }

    async fn adjust(&self, direction: &str, adjustment: &OnDemandAdjustment) -> AppResult<()> {
        let url = format!(
            "{}/warehouses/{}/items/{}/on-demand/{}",
            self.base_url, adjustment.warehouse_id, adjustment.item_id, direction
        );

        let mut request = self
            .client
            .post(&url)
            .header("Idempotency-Key", format!("{}-{}", adjustment.key, direction))
            .json(&AdjustmentRequest {
                reservation_key: &adjustment.key,
                quantity: adjustment.quantity,
            });
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::AdapterError(format!("Inventory request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::AdapterError(format!(
                "Inventory API error: {} - {}",
                status, body
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl InventoryCounter for InventoryClient {
    async fn increase_on_demand(&self, adjustment: &OnDemandAdjustment) -> AppResult<()> {
        self.adjust("increase", adjustment).await
    }

    async fn decrease_on_demand(&self, adjustment: &OnDemandAdjustment) -> AppResult<()> {
        self.adjust("decrease", adjustment).await
    }
}

// ============================================================================
// In-memory ledger
// ============================================================================

#[derive(Default)]
struct Ledger {
    on_demand: HashMap<(WarehouseId, ItemId), Decimal>,
    /// Increases currently in effect, by key
    applied: HashMap<String, OnDemandAdjustment>,
}

/// Ledger kept in process memory
#[derive(Default)]
pub struct InMemoryInventory {
    ledger: Mutex<Ledger>,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn on_demand(&self, warehouse_id: WarehouseId, item_id: ItemId) -> Decimal {
        self.ledger
            .lock()
            .await
            .on_demand
            .get(&(warehouse_id, item_id))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }
}

#[async_trait]
impl InventoryCounter for InMemoryInventory {
    async fn increase_on_demand(&self, adjustment: &OnDemandAdjustment) -> AppResult<()> {
        let mut ledger = self.ledger.lock().await;
        if ledger.applied.contains_key(&adjustment.key) {
            return Ok(());
        }

        let counter = ledger
            .on_demand
            .entry((adjustment.warehouse_id, adjustment.item_id))
            .or_insert(Decimal::ZERO);
        *counter = counter.checked_add(adjustment.quantity).ok_or_else(|| {
            AppError::AdapterError(format!(
                "On-demand quantity of item {} out of range",
                adjustment.item_id
            ))
        })?;
        ledger.applied.insert(adjustment.key.clone(), adjustment.clone());
        Ok(())
    }

    async fn decrease_on_demand(&self, adjustment: &OnDemandAdjustment) -> AppResult<()> {
        let mut ledger = self.ledger.lock().await;
        let Some(applied) = ledger.applied.remove(&adjustment.key) else {
            return Ok(());
        };

        let counter = ledger
            .on_demand
            .entry((applied.warehouse_id, applied.item_id))
            .or_insert(Decimal::ZERO);
        *counter -= applied.quantity;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adjustment(key: &str, warehouse_id: WarehouseId, item_id: ItemId, quantity: i64) -> OnDemandAdjustment {
        OnDemandAdjustment {
            key: key.to_string(),
            warehouse_id,
            item_id,
            quantity: Decimal::from(quantity),
        }
    }

    #[tokio::test]
    async fn test_in_memory_increase_then_decrease() {
        let ledger = InMemoryInventory::new();
        ledger.increase_on_demand(&adjustment("a", 1, 10, 5)).await.unwrap();
        ledger.increase_on_demand(&adjustment("b", 1, 10, 3)).await.unwrap();
        assert_eq!(ledger.on_demand(1, 10).await, Decimal::from(8));

        ledger.decrease_on_demand(&adjustment("a", 1, 10, 5)).await.unwrap();
        assert_eq!(ledger.on_demand(1, 10).await, Decimal::from(3));
        assert_eq!(ledger.on_demand(2, 10).await, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_in_memory_keys_are_idempotent() {
        let ledger = InMemoryInventory::new();
        let reserve = adjustment("po-1-line-0", 1, 10, 5);

        ledger.increase_on_demand(&reserve).await.unwrap();
        ledger.increase_on_demand(&reserve).await.unwrap();
        assert_eq!(ledger.on_demand(1, 10).await, Decimal::from(5));

        ledger.decrease_on_demand(&reserve).await.unwrap();
        ledger.decrease_on_demand(&reserve).await.unwrap();
        assert_eq!(ledger.on_demand(1, 10).await, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_in_memory_decrease_without_increase_is_noop() {
        let ledger = InMemoryInventory::new();
        ledger.increase_on_demand(&adjustment("kept", 1, 10, 4)).await.unwrap();

        ledger.decrease_on_demand(&adjustment("never-applied", 1, 10, 4)).await.unwrap();
        assert_eq!(ledger.on_demand(1, 10).await, Decimal::from(4));
    }

    #[tokio::test]
    async fn test_in_memory_overflow_is_adapter_error() {
        let ledger = InMemoryInventory::new();
        let mut first = adjustment("first", 1, 10, 0);
        first.quantity = Decimal::MAX;
        ledger.increase_on_demand(&first).await.unwrap();

        let err = ledger
            .increase_on_demand(&adjustment("second", 1, 10, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AdapterError(_)));
        assert_eq!(ledger.on_demand(1, 10).await, Decimal::MAX);
    }

    #[tokio::test]
    async fn test_unreachable_service_is_adapter_error() {
        let client = InventoryClient::with_base_url(String::new(), "http://127.0.0.1:9".into());
        let err = client
            .increase_on_demand(&adjustment("po-1-line-0", 1, 10, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AdapterError(_)));
    }
}
