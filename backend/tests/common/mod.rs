//! Test fixtures shared by the workflow integration tests
//!
//! Company 1 buys from company 2; company 3 is an unrelated tenant.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use commerce_backend::error::{AppError, AppResult};
use commerce_backend::external::{InventoryCounter, OnDemandAdjustment};
use commerce_backend::services::orders::{CreatePurchaseOrderInput, CreateSalesOrderInput};
use commerce_backend::services::rfq::{CreateQuotationInput, CreateRfqInput};
use commerce_backend::services::Clock;
use commerce_backend::store::{MemoryCatalog, MemoryCommerceStore, SalesOrderCommit};
use commerce_backend::CommerceDeps;
use rust_decimal::Decimal;
use shared::{
    ActingCompany, DeliveryStatus, EntityId, ItemId, PurchaseOrder, Quotation,
    QuotationLineItem, Rfq, RfqLineItem, WarehouseId,
};

pub const BUYER: ActingCompany = ActingCompany { company_id: 1 };
pub const SUPPLIER: ActingCompany = ActingCompany { company_id: 2 };
pub const OUTSIDER: ActingCompany = ActingCompany { company_id: 3 };

pub const BUYER_ITEM_A: ItemId = 101;
pub const BUYER_ITEM_B: ItemId = 102;
pub const SUPPLIER_ITEM_A: ItemId = 201;
pub const SUPPLIER_ITEM_B: ItemId = 202;
/// Known to the supplier but not offered for sale
pub const SUPPLIER_INTERNAL_ITEM: ItemId = 299;

pub const BUYER_WAREHOUSE: WarehouseId = 11;
pub const SUPPLIER_WAREHOUSE: WarehouseId = 21;

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

// ============================================================================
// Clock
// ============================================================================

/// Clock that only moves when told to
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now = *now + by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

pub fn start_of_test() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

// ============================================================================
// Inventory
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum InventoryCall {
    Increase(WarehouseId, ItemId, Decimal),
    Decrease(WarehouseId, ItemId, Decimal),
}

/// How the n-th increase goes wrong
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IncreaseFailure {
    /// The ledger refuses the increase
    Rejected,
    /// The ledger applies the increase but the response never arrives
    LostResponse,
}

type Hook = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Keyed inventory ledger that records every effective change and can fail
/// the n-th increase
#[derive(Default)]
pub struct RecordingInventory {
    calls: Mutex<Vec<InventoryCall>>,
    applied: Mutex<HashMap<String, OnDemandAdjustment>>,
    failure: Option<(usize, IncreaseFailure)>,
    increases_seen: Mutex<usize>,
    before_first_increase: Mutex<Option<Hook>>,
}

impl RecordingInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the n-th increase (1-based)
    pub fn failing_at(n: usize) -> Self {
        Self::failing_with(n, IncreaseFailure::Rejected)
    }

    /// Apply the n-th increase (1-based) but report a timeout
    pub fn losing_response_at(n: usize) -> Self {
        Self::failing_with(n, IncreaseFailure::LostResponse)
    }

    pub fn failing_with(n: usize, failure: IncreaseFailure) -> Self {
        Self {
            failure: Some((n, failure)),
            ..Self::default()
        }
    }

    /// Run `hook` to completion when the next increase arrives, before applying it
    pub fn before_first_increase(&self, hook: impl Future<Output = ()> + Send + 'static) {
        *self.before_first_increase.lock().unwrap() = Some(Box::pin(hook));
    }

    pub fn calls(&self) -> Vec<InventoryCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn increase_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, InventoryCall::Increase(..)))
            .count()
    }

    /// Net on-demand change for an item at a warehouse
    pub fn net(&self, warehouse_id: WarehouseId, item_id: ItemId) -> Decimal {
        self.calls()
            .iter()
            .map(|c| match c {
                InventoryCall::Increase(w, i, q) if *w == warehouse_id && *i == item_id => *q,
                InventoryCall::Decrease(w, i, q) if *w == warehouse_id && *i == item_id => -*q,
                _ => Decimal::ZERO,
            })
            .sum()
    }

    fn apply(&self, adjustment: &OnDemandAdjustment) {
        let mut applied = self.applied.lock().unwrap();
        if applied.contains_key(&adjustment.key) {
            return;
        }
        applied.insert(adjustment.key.clone(), adjustment.clone());
        self.calls.lock().unwrap().push(InventoryCall::Increase(
            adjustment.warehouse_id,
            adjustment.item_id,
            adjustment.quantity,
        ));
    }
}

#[async_trait]
impl InventoryCounter for RecordingInventory {
    async fn increase_on_demand(&self, adjustment: &OnDemandAdjustment) -> AppResult<()> {
        let hook = self.before_first_increase.lock().unwrap().take();
        if let Some(hook) = hook {
            hook.await;
        }

        let attempt = {
            let mut seen = self.increases_seen.lock().unwrap();
            *seen += 1;
            *seen
        };
        match self.failure {
            Some((n, IncreaseFailure::Rejected)) if n == attempt => {
                Err(AppError::AdapterError("inventory ledger unavailable".into()))
            }
            Some((n, IncreaseFailure::LostResponse)) if n == attempt => {
                self.apply(adjustment);
                Err(AppError::AdapterError("timeout".into()))
            }
            _ => {
                self.apply(adjustment);
                Ok(())
            }
        }
    }

    async fn decrease_on_demand(&self, adjustment: &OnDemandAdjustment) -> AppResult<()> {
        let Some(applied) = self.applied.lock().unwrap().remove(&adjustment.key) else {
            return Ok(());
        };
        self.calls.lock().unwrap().push(InventoryCall::Decrease(
            applied.warehouse_id,
            applied.item_id,
            applied.quantity,
        ));
        Ok(())
    }
}

// ============================================================================
// Fixture
// ============================================================================

pub fn catalog() -> MemoryCatalog {
    MemoryCatalog::new()
        .with_item(BUYER.company_id, BUYER_ITEM_A)
        .with_item(BUYER.company_id, BUYER_ITEM_B)
        .with_sellable_item(SUPPLIER.company_id, SUPPLIER_ITEM_A)
        .with_sellable_item(SUPPLIER.company_id, SUPPLIER_ITEM_B)
        .with_item(SUPPLIER.company_id, SUPPLIER_INTERNAL_ITEM)
        .with_warehouse(BUYER.company_id, BUYER_WAREHOUSE)
        .with_warehouse(SUPPLIER.company_id, SUPPLIER_WAREHOUSE)
}

pub struct Fixture {
    pub deps: CommerceDeps,
    pub inventory: Arc<RecordingInventory>,
    pub clock: Arc<FixedClock>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_inventory(RecordingInventory::new())
    }

    pub fn with_inventory(inventory: RecordingInventory) -> Self {
        let inventory = Arc::new(inventory);
        let clock = Arc::new(FixedClock::new(start_of_test()));
        let deps = CommerceDeps::new(
            Arc::new(MemoryCommerceStore::new()),
            Arc::new(catalog()),
            inventory.clone(),
        )
        .with_clock(clock.clone());

        Self { deps, inventory, clock }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ------------------------------------------------------------------------
    // Inputs
    // ------------------------------------------------------------------------

    pub fn rfq_input(&self) -> CreateRfqInput {
        CreateRfqInput {
            supplier_company_id: SUPPLIER.company_id,
            need_by_date: self.now() + Duration::days(14),
            line_items: vec![
                RfqLineItem {
                    buyer_item_id: BUYER_ITEM_A,
                    supplier_item_id: SUPPLIER_ITEM_A,
                    quantity: dec("10"),
                    note: None,
                },
                RfqLineItem {
                    buyer_item_id: BUYER_ITEM_B,
                    supplier_item_id: SUPPLIER_ITEM_B,
                    quantity: dec("5"),
                    note: Some("Palletised".into()),
                },
            ],
        }
    }

    /// 10 × 100,000 and 5 × 50,000 at 10% tax
    pub fn quotation_input(&self) -> CreateQuotationInput {
        CreateQuotationInput {
            line_items: vec![
                QuotationLineItem {
                    buyer_item_id: BUYER_ITEM_A,
                    supplier_item_id: SUPPLIER_ITEM_A,
                    quantity: dec("10"),
                    unit_price: dec("100000"),
                    discount: Decimal::ZERO,
                    note: None,
                },
                QuotationLineItem {
                    buyer_item_id: BUYER_ITEM_B,
                    supplier_item_id: SUPPLIER_ITEM_B,
                    quantity: dec("5"),
                    unit_price: dec("50000"),
                    discount: Decimal::ZERO,
                    note: None,
                },
            ],
            tax_rate: dec("10"),
        }
    }

    pub fn po_input(&self, quotation_id: EntityId) -> CreatePurchaseOrderInput {
        CreatePurchaseOrderInput {
            quotation_id,
            receive_warehouse_id: BUYER_WAREHOUSE,
            payment_method: "bank_transfer".into(),
            delivery_address: "Buyer Dock 3, Bangna".into(),
        }
    }

    pub fn so_input(&self) -> CreateSalesOrderInput {
        CreateSalesOrderInput {
            issue_warehouse_id: SUPPLIER_WAREHOUSE,
            payment_method: "bank_transfer".into(),
            delivery_from_address: "Supplier Warehouse, Rayong".into(),
        }
    }

    // ------------------------------------------------------------------------
    // Lifecycle shortcuts
    // ------------------------------------------------------------------------

    pub async fn pending_rfq(&self) -> Rfq {
        self.deps.rfqs().create_rfq(BUYER, self.rfq_input()).await.unwrap()
    }

    pub async fn quoted_rfq(&self) -> (Rfq, Quotation) {
        let rfq = self.pending_rfq().await;
        let quotation = self
            .deps
            .rfqs()
            .create_quotation(SUPPLIER, rfq.id, self.quotation_input())
            .await
            .unwrap();
        (rfq, quotation)
    }

    pub async fn accepted_quotation(&self) -> Quotation {
        let (rfq, _) = self.quoted_rfq().await;
        self.deps.rfqs().accept_quotation(BUYER, rfq.id).await.unwrap()
    }

    pub async fn pending_po(&self) -> PurchaseOrder {
        let quotation = self.accepted_quotation().await;
        self.deps
            .orders()
            .create_po(BUYER, self.po_input(quotation.id))
            .await
            .unwrap()
    }

    pub async fn sales_order(&self) -> SalesOrderCommit {
        let purchase_order = self.pending_po().await;
        self.deps
            .orders()
            .create_so(SUPPLIER, purchase_order.id, self.so_input())
            .await
            .unwrap()
    }

    /// Sales order whose goods have been issued by the warehouse
    pub async fn issued_sales_order(&self) -> SalesOrderCommit {
        let commit = self.sales_order().await;
        let (issue_ticket, sales_order) = self
            .deps
            .orders()
            .confirm_issue_ticket(SUPPLIER, commit.issue_ticket.id)
            .await
            .unwrap();
        SalesOrderCommit {
            sales_order,
            issue_ticket,
            purchase_order: commit.purchase_order,
        }
    }

    /// Delivery opened for an issued sales order, with its ids
    pub async fn open_delivery(&self) -> (EntityId, SalesOrderCommit) {
        let commit = self.issued_sales_order().await;
        let delivery = self
            .deps
            .deliveries()
            .open_delivery(SUPPLIER, commit.sales_order.id)
            .await
            .unwrap();
        assert_eq!(delivery.delivery_order.status, DeliveryStatus::AwaitingPickup);
        (delivery.delivery_order.id, commit)
    }
}
