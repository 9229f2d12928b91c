//! RFQ and quotation lifecycle
//!
//! The buyer raises an RFQ against one supplier, the supplier answers it with
//! exactly one quotation, and the buyer accepts or rejects that quotation. The
//! RFQ and its quotation always carry mirrored statuses.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::workflow::{self, QuotationDecision, RfqAction, StatusChange};
use shared::{
    validate_distinct_parties, validate_need_by_date, validate_quotation_line_items,
    validate_quoted_items, validate_rfq_line_items, validate_tax_rate, ActingCompany, CompanyId,
    EntityId, Party, Quotation, QuotationLineItem, QuotationTotals, Rfq, RfqLineItem, RfqStatus,
};
use validator::Validate;

use super::{field_error, participant, require_party, CommerceDeps};
use crate::error::{AppError, AppResult};
use crate::store::{NewQuotation, NewRfq};

/// RFQ service
#[derive(Clone)]
pub struct RfqService {
    deps: CommerceDeps,
}

/// Input for raising an RFQ; the acting company is the buyer
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRfqInput {
    pub supplier_company_id: CompanyId,
    pub need_by_date: DateTime<Utc>,
    #[validate(length(min = 1, message = "At least one line item is required"))]
    pub line_items: Vec<RfqLineItem>,
}

/// Input for quoting an RFQ; the acting company is the supplier
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateQuotationInput {
    #[validate(length(min = 1, message = "At least one line item is required"))]
    pub line_items: Vec<QuotationLineItem>,
    /// Percent
    pub tax_rate: Decimal,
}

/// RFQ as seen by one of its parties
#[derive(Debug, Clone, Serialize)]
pub struct RfqDetail {
    #[serde(flatten)]
    pub rfq: Rfq,
    /// Stored status projected onto the current instant
    pub effective_status: RfqStatus,
    pub quotation: Option<Quotation>,
}

impl RfqService {
    pub fn new(deps: CommerceDeps) -> Self {
        Self { deps }
    }

    async fn load_rfq(&self, rfq_id: EntityId) -> AppResult<Rfq> {
        self.deps
            .store
            .find_rfq(rfq_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("RFQ {}", rfq_id)))
    }

    // ========================================================================
    // RFQ
    // ========================================================================

    pub async fn create_rfq(&self, actor: ActingCompany, input: CreateRfqInput) -> AppResult<Rfq> {
        input.validate()?;
        validate_rfq_line_items(&input.line_items).map_err(field_error("line_items"))?;
        validate_distinct_parties(actor.company_id, input.supplier_company_id)
            .map_err(field_error("supplier_company_id"))?;
        validate_need_by_date(input.need_by_date, self.deps.clock.now())
            .map_err(field_error("need_by_date"))?;

        for line in &input.line_items {
            if !self.deps.catalog.item_exists(actor.company_id, line.buyer_item_id).await? {
                return Err(AppError::Validation {
                    field: "line_items".to_string(),
                    message: format!("Item {} is not in the buyer's catalog", line.buyer_item_id),
                });
            }
            if !self
                .deps
                .catalog
                .item_is_sellable(input.supplier_company_id, line.supplier_item_id)
                .await?
            {
                return Err(AppError::Validation {
                    field: "line_items".to_string(),
                    message: format!(
                        "Item {} is not sold by supplier {}",
                        line.supplier_item_id, input.supplier_company_id
                    ),
                });
            }
        }

        let rfq = self
            .deps
            .store
            .insert_rfq(NewRfq {
                buyer_company_id: actor.company_id,
                supplier_company_id: input.supplier_company_id,
                need_by_date: input.need_by_date,
                line_items: input.line_items,
            })
            .await?;

        tracing::info!(
            "RFQ {} raised by company {} to supplier {}",
            rfq.code,
            rfq.buyer_company_id,
            rfq.supplier_company_id
        );
        Ok(rfq)
    }

    /// Withdraw an RFQ that has not been quoted yet
    pub async fn cancel_rfq(&self, actor: ActingCompany, rfq_id: EntityId) -> AppResult<Rfq> {
        let rfq = self.load_rfq(rfq_id).await?;
        require_party(
            actor,
            rfq.buyer_company_id,
            rfq.supplier_company_id,
            Party::Buyer,
            "RFQ",
            rfq_id,
            "cancel an RFQ",
        )?;

        let target = workflow::rfq_transition(rfq.effective_status(self.deps.clock.now()), RfqAction::Cancel)?;
        let rfq = self
            .deps
            .store
            .update_rfq_status(rfq_id, StatusChange::new(rfq.status, target))
            .await?;

        tracing::info!("RFQ {} cancelled", rfq.code);
        Ok(rfq)
    }

    pub async fn get_rfq(&self, actor: ActingCompany, rfq_id: EntityId) -> AppResult<RfqDetail> {
        let rfq = self.load_rfq(rfq_id).await?;
        participant(actor, rfq.buyer_company_id, rfq.supplier_company_id, "RFQ", rfq_id)?;

        let quotation = self.deps.store.find_quotation_by_rfq(rfq_id).await?;
        Ok(RfqDetail {
            effective_status: rfq.effective_status(self.deps.clock.now()),
            rfq,
            quotation,
        })
    }

    // ========================================================================
    // Quotation
    // ========================================================================

    /// Quote an RFQ. The RFQ moves to `Quoted` together with the insert.
    pub async fn create_quotation(
        &self,
        actor: ActingCompany,
        rfq_id: EntityId,
        input: CreateQuotationInput,
    ) -> AppResult<Quotation> {
        input.validate()?;
        let rfq = self.load_rfq(rfq_id).await?;
        require_party(
            actor,
            rfq.buyer_company_id,
            rfq.supplier_company_id,
            Party::Supplier,
            "RFQ",
            rfq_id,
            "quote an RFQ",
        )?;

        if self.deps.store.find_quotation_by_rfq(rfq_id).await?.is_some() {
            return Err(AppError::conflict("quotation", format!("RFQ {} already has a quotation", rfq.code)));
        }
        let target = workflow::rfq_transition(rfq.effective_status(self.deps.clock.now()), RfqAction::Quote)?;

        validate_quotation_line_items(&input.line_items).map_err(field_error("line_items"))?;
        validate_quoted_items(&input.line_items, &rfq.line_items).map_err(field_error("line_items"))?;
        validate_tax_rate(input.tax_rate).map_err(field_error("tax_rate"))?;

        let totals = QuotationTotals::compute(&input.line_items, input.tax_rate)
            .ok_or_else(|| AppError::validation("line_items", "Quotation amounts out of range"))?;
        let (rfq, quotation) = self
            .deps
            .store
            .insert_quotation(
                NewQuotation {
                    rfq_id,
                    buyer_company_id: rfq.buyer_company_id,
                    supplier_company_id: rfq.supplier_company_id,
                    tax_rate: input.tax_rate,
                    totals,
                    line_items: input.line_items,
                },
                StatusChange::new(rfq.status, target),
            )
            .await
            .map_err(|e| {
                if matches!(e, AppError::StaleStatus(_)) {
                    tracing::warn!("RFQ {} changed while it was being quoted", rfq_id);
                }
                e
            })?;

        tracing::info!(
            "Quotation {} for RFQ {} total {}",
            quotation.code,
            rfq.code,
            quotation.total_amount
        );
        Ok(quotation)
    }

    pub async fn accept_quotation(&self, actor: ActingCompany, rfq_id: EntityId) -> AppResult<Quotation> {
        self.decide(actor, rfq_id, QuotationDecision::Accept).await
    }

    pub async fn reject_quotation(&self, actor: ActingCompany, rfq_id: EntityId) -> AppResult<Quotation> {
        self.decide(actor, rfq_id, QuotationDecision::Reject).await
    }

    async fn decide(
        &self,
        actor: ActingCompany,
        rfq_id: EntityId,
        decision: QuotationDecision,
    ) -> AppResult<Quotation> {
        let rfq = self.load_rfq(rfq_id).await?;
        require_party(
            actor,
            rfq.buyer_company_id,
            rfq.supplier_company_id,
            Party::Buyer,
            "RFQ",
            rfq_id,
            "decide on a quotation",
        )?;

        let effective = rfq.effective_status(self.deps.clock.now());
        let Some(quotation) = self.deps.store.find_quotation_by_rfq(rfq_id).await? else {
            return Err(AppError::InvalidState(format!(
                "RFQ {} has no quotation to decide on while {}",
                rfq.code,
                effective.as_str()
            )));
        };

        let mirrored = workflow::decide_quotation(effective, quotation.status, decision)?;
        let (rfq, quotation) = self
            .deps
            .store
            .apply_quotation_decision(rfq_id, quotation.id, mirrored)
            .await?;

        tracing::info!("Quotation {} {} by buyer of RFQ {}", quotation.code, quotation.status, rfq.code);
        Ok(quotation)
    }

    pub async fn get_quotation(&self, actor: ActingCompany, quotation_id: EntityId) -> AppResult<Quotation> {
        let quotation = self
            .deps
            .store
            .find_quotation(quotation_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Quotation {}", quotation_id)))?;
        participant(
            actor,
            quotation.buyer_company_id,
            quotation.supplier_company_id,
            "Quotation",
            quotation_id,
        )?;
        Ok(quotation)
    }
}
