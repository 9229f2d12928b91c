//! Request extractors

pub mod company;

pub use company::{CurrentCompany, COMPANY_HEADER};
