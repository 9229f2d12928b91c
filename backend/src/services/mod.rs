//! Workflow services for the B2B order lifecycle

pub mod delivery;
pub mod orders;
pub mod rfq;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use shared::{ActingCompany, CompanyId, EntityId, Party};

use crate::error::{AppError, AppResult};
use crate::external::InventoryCounter;
use crate::store::{Catalog, CommerceStore};

pub use delivery::DeliveryService;
pub use orders::OrderService;
pub use rfq::RfqService;

/// Source of the current instant
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Collaborators shared by every workflow service
#[derive(Clone)]
pub struct CommerceDeps {
    pub store: Arc<dyn CommerceStore>,
    pub catalog: Arc<dyn Catalog>,
    pub inventory: Arc<dyn InventoryCounter>,
    pub clock: Arc<dyn Clock>,
}

impl CommerceDeps {
    pub fn new(
        store: Arc<dyn CommerceStore>,
        catalog: Arc<dyn Catalog>,
        inventory: Arc<dyn InventoryCounter>,
    ) -> Self {
        Self {
            store,
            catalog,
            inventory,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn rfqs(&self) -> RfqService {
        RfqService::new(self.clone())
    }

    pub fn orders(&self) -> OrderService {
        OrderService::new(self.clone())
    }

    pub fn deliveries(&self) -> DeliveryService {
        DeliveryService::new(self.clone())
    }
}

/// Role of the acting company on a record.
///
/// Companies outside the buyer/supplier pair get `NotFound` so that records
/// are never disclosed across tenants.
pub(crate) fn participant(
    actor: ActingCompany,
    buyer_company_id: CompanyId,
    supplier_company_id: CompanyId,
    entity: &str,
    id: EntityId,
) -> AppResult<Party> {
    actor
        .party(buyer_company_id, supplier_company_id)
        .ok_or_else(|| AppError::NotFound(format!("{} {}", entity, id)))
}

/// Require the acting company to hold a specific role on a record
pub(crate) fn require_party(
    actor: ActingCompany,
    buyer_company_id: CompanyId,
    supplier_company_id: CompanyId,
    required: Party,
    entity: &str,
    id: EntityId,
    action: &str,
) -> AppResult<()> {
    let party = participant(actor, buyer_company_id, supplier_company_id, entity, id)?;
    if party != required {
        return Err(AppError::Forbidden(format!("Only the {} can {}", required, action)));
    }
    Ok(())
}

/// Map a shared validation failure onto a field error
pub(crate) fn field_error(field: &'static str) -> impl Fn(&'static str) -> AppError {
    move |message| AppError::validation(field, message)
}
