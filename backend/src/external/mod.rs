//! External service integrations

pub mod inventory;

pub use inventory::{InMemoryInventory, InventoryClient, InventoryCounter, OnDemandAdjustment};
