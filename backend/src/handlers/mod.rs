//! HTTP request handlers

pub mod delivery;
pub mod health;
pub mod orders;
pub mod rfq;

pub use delivery::*;
pub use health::*;
pub use orders::*;
pub use rfq::*;
