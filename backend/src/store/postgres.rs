//! PostgreSQL store
//!
//! Line items and waypoints are stored as JSONB next to their document.
//! Status columns hold the snake_case names from `as_str()`. Multi-record
//! changes run in one transaction; the parent row is locked with
//! `FOR UPDATE` before a 1:1 counterpart is inserted.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use shared::workflow::{self, DeliveryStep, MirroredDecision, StatusChange};
use shared::{
    generate_document_code, insert_stop, stamp_destination, stamp_origin, CompanyId,
    DeliveryOrder, DeliveryStatus, DocumentKind, EntityId, IssueTicket, IssueTicketStatus,
    ItemId, PoStatus, PurchaseOrder, Quotation, QuotationLineItem, QuotationStatus, Rfq,
    RfqLineItem, RfqStatus, SalesOrder, SalesOrderLineItem, SoStatus, WarehouseId, Waypoint,
};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};

use super::{
    not_found, stale, Catalog, CommerceStore, DeliveryProgress, NewDeliveryOrder,
    NewPurchaseOrder, NewQuotation, NewRfq, NewSalesOrder, SalesOrderCommit,
};
use crate::error::{AppError, AppResult};

const RFQ_COLUMNS: &str = "id, code, buyer_company_id, supplier_company_id, need_by_date, \
    status, line_items, created_at, updated_at";

const QUOTATION_COLUMNS: &str = "id, code, rfq_id, buyer_company_id, supplier_company_id, \
    status, tax_rate, sub_total, tax_amount, total_amount, line_items, created_at, updated_at";

const PURCHASE_ORDER_COLUMNS: &str = "id, code, buyer_company_id, supplier_company_id, \
    quotation_id, receive_warehouse_id, payment_method, delivery_address, status, \
    created_at, updated_at";

const SALES_ORDER_COLUMNS: &str = "id, code, supplier_company_id, buyer_company_id, \
    purchase_order_id, issue_warehouse_id, payment_method, delivery_from_address, \
    delivery_to_address, status, line_items, created_at, updated_at";

const ISSUE_TICKET_COLUMNS: &str = "id, code, sales_order_id, sales_order_code, warehouse_id, \
    supplier_company_id, status, created_at, updated_at";

const DELIVERY_ORDER_COLUMNS: &str = "id, code, sales_order_id, supplier_company_id, \
    buyer_company_id, status, waypoints, created_at, updated_at";

// ============================================================================
// Rows
// ============================================================================

fn parse_status<S>(value: &str, parse: fn(&str) -> Option<S>, entity: &str) -> AppResult<S> {
    parse(value).ok_or_else(|| AppError::Internal(format!("Unknown {} status '{}'", entity, value)))
}

#[derive(Debug, sqlx::FromRow)]
struct RfqRow {
    id: i64,
    code: String,
    buyer_company_id: i64,
    supplier_company_id: i64,
    need_by_date: DateTime<Utc>,
    status: String,
    line_items: Json<Vec<RfqLineItem>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RfqRow> for Rfq {
    type Error = AppError;

    fn try_from(row: RfqRow) -> AppResult<Self> {
        Ok(Rfq {
            id: row.id,
            code: row.code,
            buyer_company_id: row.buyer_company_id,
            supplier_company_id: row.supplier_company_id,
            need_by_date: row.need_by_date,
            status: parse_status(&row.status, RfqStatus::from_str, "RFQ")?,
            line_items: row.line_items.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct QuotationRow {
    id: i64,
    code: String,
    rfq_id: i64,
    buyer_company_id: i64,
    supplier_company_id: i64,
    status: String,
    tax_rate: Decimal,
    sub_total: Decimal,
    tax_amount: Decimal,
    total_amount: Decimal,
    line_items: Json<Vec<QuotationLineItem>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<QuotationRow> for Quotation {
    type Error = AppError;

    fn try_from(row: QuotationRow) -> AppResult<Self> {
        Ok(Quotation {
            id: row.id,
            code: row.code,
            rfq_id: row.rfq_id,
            buyer_company_id: row.buyer_company_id,
            supplier_company_id: row.supplier_company_id,
            status: parse_status(&row.status, QuotationStatus::from_str, "quotation")?,
            tax_rate: row.tax_rate,
            sub_total: row.sub_total,
            tax_amount: row.tax_amount,
            total_amount: row.total_amount,
            line_items: row.line_items.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PurchaseOrderRow {
    id: i64,
    code: String,
    buyer_company_id: i64,
    supplier_company_id: i64,
    quotation_id: i64,
    receive_warehouse_id: i64,
    payment_method: String,
    delivery_address: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PurchaseOrderRow> for PurchaseOrder {
    type Error = AppError;

    fn try_from(row: PurchaseOrderRow) -> AppResult<Self> {
        Ok(PurchaseOrder {
            id: row.id,
            code: row.code,
            buyer_company_id: row.buyer_company_id,
            supplier_company_id: row.supplier_company_id,
            quotation_id: row.quotation_id,
            receive_warehouse_id: row.receive_warehouse_id,
            payment_method: row.payment_method,
            delivery_address: row.delivery_address,
            status: parse_status(&row.status, PoStatus::from_str, "purchase order")?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SalesOrderRow {
    id: i64,
    code: String,
    supplier_company_id: i64,
    buyer_company_id: i64,
    purchase_order_id: i64,
    issue_warehouse_id: i64,
    payment_method: String,
    delivery_from_address: String,
    delivery_to_address: String,
    status: String,
    line_items: Json<Vec<SalesOrderLineItem>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SalesOrderRow> for SalesOrder {
    type Error = AppError;

    fn try_from(row: SalesOrderRow) -> AppResult<Self> {
        Ok(SalesOrder {
            id: row.id,
            code: row.code,
            supplier_company_id: row.supplier_company_id,
            buyer_company_id: row.buyer_company_id,
            purchase_order_id: row.purchase_order_id,
            issue_warehouse_id: row.issue_warehouse_id,
            payment_method: row.payment_method,
            delivery_from_address: row.delivery_from_address,
            delivery_to_address: row.delivery_to_address,
            status: parse_status(&row.status, SoStatus::from_str, "sales order")?,
            line_items: row.line_items.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct IssueTicketRow {
    id: i64,
    code: String,
    sales_order_id: i64,
    sales_order_code: String,
    warehouse_id: i64,
    supplier_company_id: i64,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<IssueTicketRow> for IssueTicket {
    type Error = AppError;

    fn try_from(row: IssueTicketRow) -> AppResult<Self> {
        Ok(IssueTicket {
            id: row.id,
            code: row.code,
            sales_order_id: row.sales_order_id,
            sales_order_code: row.sales_order_code,
            warehouse_id: row.warehouse_id,
            supplier_company_id: row.supplier_company_id,
            status: parse_status(&row.status, IssueTicketStatus::from_str, "issue ticket")?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DeliveryOrderRow {
    id: i64,
    code: String,
    sales_order_id: i64,
    supplier_company_id: i64,
    buyer_company_id: i64,
    status: String,
    waypoints: Json<Vec<Waypoint>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DeliveryOrderRow> for DeliveryOrder {
    type Error = AppError;

    fn try_from(row: DeliveryOrderRow) -> AppResult<Self> {
        Ok(DeliveryOrder {
            id: row.id,
            code: row.code,
            sales_order_id: row.sales_order_id,
            supplier_company_id: row.supplier_company_id,
            buyer_company_id: row.buyer_company_id,
            status: parse_status(&row.status, DeliveryStatus::from_str, "delivery")?,
            waypoints: row.waypoints.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn unique_conflict(err: sqlx::Error, resource: &str, message: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return AppError::conflict(resource, message);
        }
    }
    AppError::DatabaseError(err)
}

async fn next_id(tx: &mut Transaction<'_, Postgres>, table: &str) -> AppResult<EntityId> {
    let id = sqlx::query_scalar::<_, i64>("SELECT nextval(pg_get_serial_sequence($1, 'id'))")
        .bind(table)
        .fetch_one(&mut **tx)
        .await?;
    Ok(id)
}

// ============================================================================
// Store
// ============================================================================

/// Commerce records in PostgreSQL
#[derive(Clone)]
pub struct PgCommerceStore {
    db: PgPool,
}

impl PgCommerceStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn cas_purchase_order(
        tx: &mut Transaction<'_, Postgres>,
        id: EntityId,
        change: StatusChange<PoStatus>,
    ) -> AppResult<PurchaseOrder> {
        sqlx::query_as::<_, PurchaseOrderRow>(&format!(
            "UPDATE purchase_orders SET status = $1, updated_at = NOW() \
             WHERE id = $2 AND status = $3 RETURNING {}",
            PURCHASE_ORDER_COLUMNS
        ))
        .bind(change.to.as_str())
        .bind(id)
        .bind(change.from.as_str())
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| stale("Purchase order", id, change.from.as_str()))?
        .try_into()
    }

    async fn cas_sales_order(
        tx: &mut Transaction<'_, Postgres>,
        id: EntityId,
        change: StatusChange<SoStatus>,
    ) -> AppResult<SalesOrder> {
        sqlx::query_as::<_, SalesOrderRow>(&format!(
            "UPDATE sales_orders SET status = $1, updated_at = NOW() \
             WHERE id = $2 AND status = $3 RETURNING {}",
            SALES_ORDER_COLUMNS
        ))
        .bind(change.to.as_str())
        .bind(id)
        .bind(change.from.as_str())
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| stale("Sales order", id, change.from.as_str()))?
        .try_into()
    }

    async fn lock_delivery_order(
        tx: &mut Transaction<'_, Postgres>,
        id: EntityId,
    ) -> AppResult<DeliveryOrder> {
        sqlx::query_as::<_, DeliveryOrderRow>(&format!(
            "SELECT {} FROM delivery_orders WHERE id = $1 FOR UPDATE",
            DELIVERY_ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| not_found("Delivery order", id))?
        .try_into()
    }

    async fn write_delivery_order(
        tx: &mut Transaction<'_, Postgres>,
        id: EntityId,
        status: DeliveryStatus,
        waypoints: &[Waypoint],
    ) -> AppResult<DeliveryOrder> {
        sqlx::query_as::<_, DeliveryOrderRow>(&format!(
            "UPDATE delivery_orders SET status = $1, waypoints = $2, updated_at = NOW() \
             WHERE id = $3 RETURNING {}",
            DELIVERY_ORDER_COLUMNS
        ))
        .bind(status.as_str())
        .bind(Json(waypoints))
        .bind(id)
        .fetch_one(&mut **tx)
        .await?
        .try_into()
    }
}

#[async_trait]
impl CommerceStore for PgCommerceStore {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }

    // ========================================================================
    // RFQ / Quotation
    // ========================================================================

    async fn insert_rfq(&self, new: NewRfq) -> AppResult<Rfq> {
        let mut tx = self.db.begin().await?;
        let id = next_id(&mut tx, "rfqs").await?;

        let row = sqlx::query_as::<_, RfqRow>(&format!(
            "INSERT INTO rfqs (id, code, buyer_company_id, supplier_company_id, need_by_date, \
             status, line_items) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            RFQ_COLUMNS
        ))
        .bind(id)
        .bind(generate_document_code(DocumentKind::Rfq, Utc::now().year(), id))
        .bind(new.buyer_company_id)
        .bind(new.supplier_company_id)
        .bind(new.need_by_date)
        .bind(RfqStatus::PendingQuote.as_str())
        .bind(Json(&new.line_items))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    async fn find_rfq(&self, id: EntityId) -> AppResult<Option<Rfq>> {
        sqlx::query_as::<_, RfqRow>(&format!("SELECT {} FROM rfqs WHERE id = $1", RFQ_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .map(Rfq::try_from)
            .transpose()
    }

    async fn update_rfq_status(&self, id: EntityId, change: StatusChange<RfqStatus>) -> AppResult<Rfq> {
        sqlx::query_as::<_, RfqRow>(&format!(
            "UPDATE rfqs SET status = $1, updated_at = NOW() \
             WHERE id = $2 AND status = $3 RETURNING {}",
            RFQ_COLUMNS
        ))
        .bind(change.to.as_str())
        .bind(id)
        .bind(change.from.as_str())
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| stale("RFQ", id, change.from.as_str()))?
        .try_into()
    }

    async fn insert_quotation(
        &self,
        new: NewQuotation,
        rfq_change: StatusChange<RfqStatus>,
    ) -> AppResult<(Rfq, Quotation)> {
        let mut tx = self.db.begin().await?;

        let current = sqlx::query_scalar::<_, String>("SELECT status FROM rfqs WHERE id = $1 FOR UPDATE")
            .bind(new.rfq_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| not_found("RFQ", new.rfq_id))?;
        let existing = sqlx::query_scalar::<_, i64>("SELECT id FROM quotations WHERE rfq_id = $1")
            .bind(new.rfq_id)
            .fetch_optional(&mut *tx)
            .await?;
        if existing.is_some() {
            return Err(AppError::conflict("quotation", "RFQ already has a quotation"));
        }
        if current != rfq_change.from.as_str() {
            return Err(stale("RFQ", new.rfq_id, rfq_change.from.as_str()));
        }

        let rfq: Rfq = sqlx::query_as::<_, RfqRow>(&format!(
            "UPDATE rfqs SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING {}",
            RFQ_COLUMNS
        ))
        .bind(rfq_change.to.as_str())
        .bind(new.rfq_id)
        .fetch_one(&mut *tx)
        .await?
        .try_into()?;

        let id = next_id(&mut tx, "quotations").await?;
        let quotation: Quotation = sqlx::query_as::<_, QuotationRow>(&format!(
            "INSERT INTO quotations (id, code, rfq_id, buyer_company_id, supplier_company_id, \
             status, tax_rate, sub_total, tax_amount, total_amount, line_items) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING {}",
            QUOTATION_COLUMNS
        ))
        .bind(id)
        .bind(generate_document_code(DocumentKind::Quotation, Utc::now().year(), id))
        .bind(new.rfq_id)
        .bind(new.buyer_company_id)
        .bind(new.supplier_company_id)
        .bind(QuotationStatus::Quoted.as_str())
        .bind(new.tax_rate)
        .bind(new.totals.sub_total)
        .bind(new.totals.tax_amount)
        .bind(new.totals.total_amount)
        .bind(Json(&new.line_items))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| unique_conflict(e, "quotation", "RFQ already has a quotation"))?
        .try_into()?;

        tx.commit().await?;
        Ok((rfq, quotation))
    }

    async fn find_quotation(&self, id: EntityId) -> AppResult<Option<Quotation>> {
        sqlx::query_as::<_, QuotationRow>(&format!(
            "SELECT {} FROM quotations WHERE id = $1",
            QUOTATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .map(Quotation::try_from)
        .transpose()
    }

    async fn find_quotation_by_rfq(&self, rfq_id: EntityId) -> AppResult<Option<Quotation>> {
        sqlx::query_as::<_, QuotationRow>(&format!(
            "SELECT {} FROM quotations WHERE rfq_id = $1",
            QUOTATION_COLUMNS
        ))
        .bind(rfq_id)
        .fetch_optional(&self.db)
        .await?
        .map(Quotation::try_from)
        .transpose()
    }

    async fn apply_quotation_decision(
        &self,
        rfq_id: EntityId,
        quotation_id: EntityId,
        decision: MirroredDecision,
    ) -> AppResult<(Rfq, Quotation)> {
        let mut tx = self.db.begin().await?;

        let rfq: Rfq = sqlx::query_as::<_, RfqRow>(&format!(
            "UPDATE rfqs SET status = $1, updated_at = NOW() \
             WHERE id = $2 AND status = $3 RETURNING {}",
            RFQ_COLUMNS
        ))
        .bind(decision.rfq.to.as_str())
        .bind(rfq_id)
        .bind(decision.rfq.from.as_str())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| stale("RFQ", rfq_id, decision.rfq.from.as_str()))?
        .try_into()?;

        let quotation: Quotation = sqlx::query_as::<_, QuotationRow>(&format!(
            "UPDATE quotations SET status = $1, updated_at = NOW() \
             WHERE id = $2 AND status = $3 RETURNING {}",
            QUOTATION_COLUMNS
        ))
        .bind(decision.quotation.to.as_str())
        .bind(quotation_id)
        .bind(decision.quotation.from.as_str())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| stale("Quotation", quotation_id, decision.quotation.from.as_str()))?
        .try_into()?;

        tx.commit().await?;
        Ok((rfq, quotation))
    }

    // ========================================================================
    // Purchase order / Sales order
    // ========================================================================

    async fn insert_purchase_order(
        &self,
        new: NewPurchaseOrder,
        quotation_status: QuotationStatus,
    ) -> AppResult<PurchaseOrder> {
        let mut tx = self.db.begin().await?;

        let current = sqlx::query_scalar::<_, String>(
            "SELECT status FROM quotations WHERE id = $1 FOR UPDATE",
        )
        .bind(new.quotation_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| not_found("Quotation", new.quotation_id))?;
        let existing = sqlx::query_scalar::<_, i64>("SELECT id FROM purchase_orders WHERE quotation_id = $1")
            .bind(new.quotation_id)
            .fetch_optional(&mut *tx)
            .await?;
        if existing.is_some() {
            return Err(AppError::conflict("purchase_order", "Quotation already has a purchase order"));
        }
        if current != quotation_status.as_str() {
            return Err(stale("Quotation", new.quotation_id, quotation_status.as_str()));
        }

        let id = next_id(&mut tx, "purchase_orders").await?;
        let purchase_order: PurchaseOrder = sqlx::query_as::<_, PurchaseOrderRow>(&format!(
            "INSERT INTO purchase_orders (id, code, buyer_company_id, supplier_company_id, \
             quotation_id, receive_warehouse_id, payment_method, delivery_address, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {}",
            PURCHASE_ORDER_COLUMNS
        ))
        .bind(id)
        .bind(generate_document_code(DocumentKind::PurchaseOrder, Utc::now().year(), id))
        .bind(new.buyer_company_id)
        .bind(new.supplier_company_id)
        .bind(new.quotation_id)
        .bind(new.receive_warehouse_id)
        .bind(&new.payment_method)
        .bind(&new.delivery_address)
        .bind(PoStatus::PendingConfirm.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| unique_conflict(e, "purchase_order", "Quotation already has a purchase order"))?
        .try_into()?;

        tx.commit().await?;
        Ok(purchase_order)
    }

    async fn find_purchase_order(&self, id: EntityId) -> AppResult<Option<PurchaseOrder>> {
        sqlx::query_as::<_, PurchaseOrderRow>(&format!(
            "SELECT {} FROM purchase_orders WHERE id = $1",
            PURCHASE_ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .map(PurchaseOrder::try_from)
        .transpose()
    }

    async fn find_purchase_order_by_quotation(
        &self,
        quotation_id: EntityId,
    ) -> AppResult<Option<PurchaseOrder>> {
        sqlx::query_as::<_, PurchaseOrderRow>(&format!(
            "SELECT {} FROM purchase_orders WHERE quotation_id = $1",
            PURCHASE_ORDER_COLUMNS
        ))
        .bind(quotation_id)
        .fetch_optional(&self.db)
        .await?
        .map(PurchaseOrder::try_from)
        .transpose()
    }

    async fn update_purchase_order_status(
        &self,
        id: EntityId,
        change: StatusChange<PoStatus>,
    ) -> AppResult<PurchaseOrder> {
        let mut tx = self.db.begin().await?;
        let purchase_order = Self::cas_purchase_order(&mut tx, id, change).await?;
        tx.commit().await?;
        Ok(purchase_order)
    }

    async fn insert_sales_order(
        &self,
        new: NewSalesOrder,
        po_change: StatusChange<PoStatus>,
    ) -> AppResult<SalesOrderCommit> {
        let mut tx = self.db.begin().await?;

        let current = sqlx::query_scalar::<_, String>(
            "SELECT status FROM purchase_orders WHERE id = $1 FOR UPDATE",
        )
        .bind(new.purchase_order_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| not_found("Purchase order", new.purchase_order_id))?;
        let existing = sqlx::query_scalar::<_, i64>("SELECT id FROM sales_orders WHERE purchase_order_id = $1")
            .bind(new.purchase_order_id)
            .fetch_optional(&mut *tx)
            .await?;
        if existing.is_some() {
            return Err(AppError::conflict("sales_order", "Purchase order already has a sales order"));
        }
        if current != po_change.from.as_str() {
            return Err(stale("Purchase order", new.purchase_order_id, po_change.from.as_str()));
        }

        let purchase_order = Self::cas_purchase_order(&mut tx, new.purchase_order_id, po_change).await?;
        let year = Utc::now().year();

        let sales_order_id = next_id(&mut tx, "sales_orders").await?;
        let sales_order: SalesOrder = sqlx::query_as::<_, SalesOrderRow>(&format!(
            "INSERT INTO sales_orders (id, code, supplier_company_id, buyer_company_id, \
             purchase_order_id, issue_warehouse_id, payment_method, delivery_from_address, \
             delivery_to_address, status, line_items) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING {}",
            SALES_ORDER_COLUMNS
        ))
        .bind(sales_order_id)
        .bind(generate_document_code(DocumentKind::SalesOrder, year, sales_order_id))
        .bind(new.supplier_company_id)
        .bind(new.buyer_company_id)
        .bind(new.purchase_order_id)
        .bind(new.issue_warehouse_id)
        .bind(&new.payment_method)
        .bind(&new.delivery_from_address)
        .bind(&new.delivery_to_address)
        .bind(SoStatus::AwaitingIssue.as_str())
        .bind(Json(&new.line_items))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| unique_conflict(e, "sales_order", "Purchase order already has a sales order"))?
        .try_into()?;

        let ticket_id = next_id(&mut tx, "issue_tickets").await?;
        let issue_ticket: IssueTicket = sqlx::query_as::<_, IssueTicketRow>(&format!(
            "INSERT INTO issue_tickets (id, code, sales_order_id, sales_order_code, warehouse_id, \
             supplier_company_id, status) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            ISSUE_TICKET_COLUMNS
        ))
        .bind(ticket_id)
        .bind(generate_document_code(DocumentKind::IssueTicket, year, ticket_id))
        .bind(sales_order.id)
        .bind(&sales_order.code)
        .bind(sales_order.issue_warehouse_id)
        .bind(sales_order.supplier_company_id)
        .bind(IssueTicketStatus::Pending.as_str())
        .fetch_one(&mut *tx)
        .await?
        .try_into()?;

        tx.commit().await?;
        Ok(SalesOrderCommit {
            sales_order,
            issue_ticket,
            purchase_order,
        })
    }

    async fn find_sales_order(&self, id: EntityId) -> AppResult<Option<SalesOrder>> {
        sqlx::query_as::<_, SalesOrderRow>(&format!(
            "SELECT {} FROM sales_orders WHERE id = $1",
            SALES_ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .map(SalesOrder::try_from)
        .transpose()
    }

    async fn find_sales_order_by_purchase_order(
        &self,
        purchase_order_id: EntityId,
    ) -> AppResult<Option<SalesOrder>> {
        sqlx::query_as::<_, SalesOrderRow>(&format!(
            "SELECT {} FROM sales_orders WHERE purchase_order_id = $1",
            SALES_ORDER_COLUMNS
        ))
        .bind(purchase_order_id)
        .fetch_optional(&self.db)
        .await?
        .map(SalesOrder::try_from)
        .transpose()
    }

    // ========================================================================
    // Issue tickets
    // ========================================================================

    async fn find_issue_ticket(&self, id: EntityId) -> AppResult<Option<IssueTicket>> {
        sqlx::query_as::<_, IssueTicketRow>(&format!(
            "SELECT {} FROM issue_tickets WHERE id = $1",
            ISSUE_TICKET_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .map(IssueTicket::try_from)
        .transpose()
    }

    async fn find_issue_ticket_by_sales_order(
        &self,
        sales_order_id: EntityId,
    ) -> AppResult<Option<IssueTicket>> {
        sqlx::query_as::<_, IssueTicketRow>(&format!(
            "SELECT {} FROM issue_tickets WHERE sales_order_id = $1",
            ISSUE_TICKET_COLUMNS
        ))
        .bind(sales_order_id)
        .fetch_optional(&self.db)
        .await?
        .map(IssueTicket::try_from)
        .transpose()
    }

    async fn list_issue_tickets(
        &self,
        supplier_company_id: CompanyId,
        status: Option<IssueTicketStatus>,
    ) -> AppResult<Vec<IssueTicket>> {
        sqlx::query_as::<_, IssueTicketRow>(&format!(
            "SELECT {} FROM issue_tickets \
             WHERE supplier_company_id = $1 AND ($2::TEXT IS NULL OR status = $2) \
             ORDER BY id",
            ISSUE_TICKET_COLUMNS
        ))
        .bind(supplier_company_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(IssueTicket::try_from)
        .collect()
    }

    async fn confirm_issue_ticket(
        &self,
        ticket_id: EntityId,
        ticket_change: StatusChange<IssueTicketStatus>,
        sales_order_id: EntityId,
        so_change: StatusChange<SoStatus>,
    ) -> AppResult<(IssueTicket, SalesOrder)> {
        let mut tx = self.db.begin().await?;

        let ticket: IssueTicket = sqlx::query_as::<_, IssueTicketRow>(&format!(
            "UPDATE issue_tickets SET status = $1, updated_at = NOW() \
             WHERE id = $2 AND status = $3 RETURNING {}",
            ISSUE_TICKET_COLUMNS
        ))
        .bind(ticket_change.to.as_str())
        .bind(ticket_id)
        .bind(ticket_change.from.as_str())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| stale("Issue ticket", ticket_id, ticket_change.from.as_str()))?
        .try_into()?;

        let sales_order = Self::cas_sales_order(&mut tx, sales_order_id, so_change).await?;

        tx.commit().await?;
        Ok((ticket, sales_order))
    }

    // ========================================================================
    // Delivery
    // ========================================================================

    async fn insert_delivery_order(
        &self,
        new: NewDeliveryOrder,
        so_status: SoStatus,
    ) -> AppResult<DeliveryOrder> {
        let mut tx = self.db.begin().await?;

        let current = sqlx::query_scalar::<_, String>(
            "SELECT status FROM sales_orders WHERE id = $1 FOR UPDATE",
        )
        .bind(new.sales_order_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| not_found("Sales order", new.sales_order_id))?;
        let existing = sqlx::query_scalar::<_, i64>("SELECT id FROM delivery_orders WHERE sales_order_id = $1")
            .bind(new.sales_order_id)
            .fetch_optional(&mut *tx)
            .await?;
        if existing.is_some() {
            return Err(AppError::conflict("delivery_order", "Sales order already has a delivery"));
        }
        if current != so_status.as_str() {
            return Err(stale("Sales order", new.sales_order_id, so_status.as_str()));
        }

        let id = next_id(&mut tx, "delivery_orders").await?;
        let delivery_order: DeliveryOrder = sqlx::query_as::<_, DeliveryOrderRow>(&format!(
            "INSERT INTO delivery_orders (id, code, sales_order_id, supplier_company_id, \
             buyer_company_id, status, waypoints) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            DELIVERY_ORDER_COLUMNS
        ))
        .bind(id)
        .bind(generate_document_code(DocumentKind::DeliveryOrder, Utc::now().year(), id))
        .bind(new.sales_order_id)
        .bind(new.supplier_company_id)
        .bind(new.buyer_company_id)
        .bind(DeliveryStatus::AwaitingPickup.as_str())
        .bind(Json(&new.waypoints))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| unique_conflict(e, "delivery_order", "Sales order already has a delivery"))?
        .try_into()?;

        tx.commit().await?;
        Ok(delivery_order)
    }

    async fn find_delivery_order(&self, id: EntityId) -> AppResult<Option<DeliveryOrder>> {
        sqlx::query_as::<_, DeliveryOrderRow>(&format!(
            "SELECT {} FROM delivery_orders WHERE id = $1",
            DELIVERY_ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .map(DeliveryOrder::try_from)
        .transpose()
    }

    async fn find_delivery_order_by_sales_order(
        &self,
        sales_order_id: EntityId,
    ) -> AppResult<Option<DeliveryOrder>> {
        sqlx::query_as::<_, DeliveryOrderRow>(&format!(
            "SELECT {} FROM delivery_orders WHERE sales_order_id = $1",
            DELIVERY_ORDER_COLUMNS
        ))
        .bind(sales_order_id)
        .fetch_optional(&self.db)
        .await?
        .map(DeliveryOrder::try_from)
        .transpose()
    }

    async fn append_waypoint(&self, id: EntityId, stop: Waypoint) -> AppResult<DeliveryOrder> {
        let mut tx = self.db.begin().await?;

        let mut delivery_order = Self::lock_delivery_order(&mut tx, id).await?;
        workflow::ensure_waypoint_appendable(
            delivery_order.status,
            delivery_order.destination_reached(),
        )?;
        insert_stop(&mut delivery_order.waypoints, stop);

        let delivery_order = Self::write_delivery_order(
            &mut tx,
            id,
            delivery_order.status,
            &delivery_order.waypoints,
        )
        .await?;

        tx.commit().await?;
        Ok(delivery_order)
    }

    async fn record_destination_arrival(
        &self,
        id: EntityId,
        arrival_time: DateTime<Utc>,
        purchase_order_id: EntityId,
        po_change: StatusChange<PoStatus>,
    ) -> AppResult<(DeliveryOrder, PurchaseOrder)> {
        let mut tx = self.db.begin().await?;

        let mut delivery_order = Self::lock_delivery_order(&mut tx, id).await?;
        if delivery_order.status != DeliveryStatus::InTransit || delivery_order.destination_reached() {
            return Err(stale("Delivery order", id, "in transit"));
        }
        stamp_destination(&mut delivery_order.waypoints, arrival_time);

        let delivery_order = Self::write_delivery_order(
            &mut tx,
            id,
            delivery_order.status,
            &delivery_order.waypoints,
        )
        .await?;
        let purchase_order = Self::cas_purchase_order(&mut tx, purchase_order_id, po_change).await?;

        tx.commit().await?;
        Ok((delivery_order, purchase_order))
    }

    async fn apply_delivery_step(
        &self,
        id: EntityId,
        sales_order_id: EntityId,
        purchase_order_id: EntityId,
        step: DeliveryStep,
        departed_at: DateTime<Utc>,
    ) -> AppResult<DeliveryProgress> {
        let mut tx = self.db.begin().await?;

        let mut delivery_order = Self::lock_delivery_order(&mut tx, id).await?;
        if delivery_order.status != step.delivery.from {
            return Err(stale("Delivery order", id, step.delivery.from.as_str()));
        }
        if step.delivery.to == DeliveryStatus::Delivered && !delivery_order.destination_reached() {
            return Err(workflow::TransitionError::DestinationNotReached.into());
        }
        if step.delivery.from == DeliveryStatus::AwaitingPickup {
            stamp_origin(&mut delivery_order.waypoints, departed_at);
        }

        let delivery_order = Self::write_delivery_order(
            &mut tx,
            id,
            step.delivery.to,
            &delivery_order.waypoints,
        )
        .await?;
        let sales_order = Self::cas_sales_order(&mut tx, sales_order_id, step.sales_order).await?;
        let purchase_order =
            Self::cas_purchase_order(&mut tx, purchase_order_id, step.purchase_order).await?;

        tx.commit().await?;
        Ok(DeliveryProgress {
            delivery_order,
            sales_order,
            purchase_order,
        })
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Item and warehouse lookups against the master-data tables
#[derive(Clone)]
pub struct PgCatalog {
    db: PgPool,
}

impl PgCatalog {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Catalog for PgCatalog {
    async fn item_exists(&self, company_id: CompanyId, item_id: ItemId) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM items WHERE id = $1 AND company_id = $2)",
        )
        .bind(item_id)
        .bind(company_id)
        .fetch_one(&self.db)
        .await?;
        Ok(exists)
    }

    async fn item_is_sellable(&self, company_id: CompanyId, item_id: ItemId) -> AppResult<bool> {
        let sellable = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM items WHERE id = $1 AND company_id = $2 AND is_sellable)",
        )
        .bind(item_id)
        .bind(company_id)
        .fetch_one(&self.db)
        .await?;
        Ok(sellable)
    }

    async fn warehouse_exists(&self, company_id: CompanyId, warehouse_id: WarehouseId) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM warehouses WHERE id = $1 AND company_id = $2)",
        )
        .bind(warehouse_id)
        .bind(company_id)
        .fetch_one(&self.db)
        .await?;
        Ok(exists)
    }
}
