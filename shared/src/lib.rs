//! Shared types and models for the B2B commerce workflow
//!
//! This crate contains the order-lifecycle domain shared between the backend,
//! the browser (via WASM), and any other embedder: entity models, the status
//! transition tables, quotation totals and input validation. It performs no I/O.

pub mod models;
pub mod types;
pub mod validation;
pub mod workflow;

pub use models::*;
pub use types::*;
pub use validation::*;
pub use workflow::{StatusChange, TransitionError};
