//! Domain models for the order lifecycle

mod delivery;
mod issue_ticket;
mod purchase_order;
mod quotation;
mod rfq;
mod sales_order;

pub use delivery::*;
pub use issue_ticket::*;
pub use purchase_order::*;
pub use quotation::*;
pub use rfq::*;
pub use sales_order::*;
