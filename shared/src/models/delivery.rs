//! Delivery order and waypoint timeline models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CompanyId, EntityId};

/// Status of a delivery order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    AwaitingPickup,
    InTransit,
    Delivered,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::AwaitingPickup => "awaiting_pickup",
            DeliveryStatus::InTransit => "in_transit",
            DeliveryStatus::Delivered => "delivered",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "awaiting_pickup" => Some(DeliveryStatus::AwaitingPickup),
            "in_transit" => Some(DeliveryStatus::InTransit),
            "delivered" => Some(DeliveryStatus::Delivered),
            _ => None,
        }
    }

    /// Position on a progress stepper. Display only.
    pub fn step_index(&self) -> usize {
        match self {
            DeliveryStatus::AwaitingPickup => 0,
            DeliveryStatus::InTransit => 1,
            DeliveryStatus::Delivered => 2,
        }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryStatus::AwaitingPickup => write!(f, "Awaiting Pickup"),
            DeliveryStatus::InTransit => write!(f, "In Transit"),
            DeliveryStatus::Delivered => write!(f, "Delivered"),
        }
    }
}

/// A point on the delivery timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Waypoint {
    pub location: String,
    pub arrival_time: Option<DateTime<Utc>>,
    pub is_origin: bool,
    pub is_destination: bool,
}

impl Waypoint {
    pub fn origin(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            arrival_time: None,
            is_origin: true,
            is_destination: false,
        }
    }

    pub fn destination(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            arrival_time: None,
            is_origin: false,
            is_destination: true,
        }
    }

    pub fn stop(location: impl Into<String>, arrival_time: DateTime<Utc>) -> Self {
        Self {
            location: location.into(),
            arrival_time: Some(arrival_time),
            is_origin: false,
            is_destination: false,
        }
    }
}

/// Shipment of a sales order from the supplier's warehouse to the buyer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryOrder {
    pub id: EntityId,
    pub code: String,
    pub sales_order_id: EntityId,
    pub supplier_company_id: CompanyId,
    pub buyer_company_id: CompanyId,
    pub status: DeliveryStatus,
    /// Origin first, destination last, stops in between in insertion order
    pub waypoints: Vec<Waypoint>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeliveryOrder {
    pub fn origin(&self) -> Option<&Waypoint> {
        self.waypoints.iter().find(|w| w.is_origin)
    }

    pub fn destination(&self) -> Option<&Waypoint> {
        self.waypoints.iter().find(|w| w.is_destination)
    }

    /// Whether an arrival time has been recorded at the destination
    pub fn destination_reached(&self) -> bool {
        self.destination()
            .map(|w| w.arrival_time.is_some())
            .unwrap_or(false)
    }

    pub fn step_index(&self) -> usize {
        self.status.step_index()
    }
}

/// Insert an intermediate stop just before the destination
pub fn insert_stop(waypoints: &mut Vec<Waypoint>, stop: Waypoint) {
    let position = waypoints
        .iter()
        .position(|w| w.is_destination)
        .unwrap_or(waypoints.len());
    waypoints.insert(position, stop);
}

/// Stamp the origin departure time if it has not been recorded
pub fn stamp_origin(waypoints: &mut [Waypoint], at: DateTime<Utc>) {
    if let Some(origin) = waypoints.iter_mut().find(|w| w.is_origin) {
        if origin.arrival_time.is_none() {
            origin.arrival_time = Some(at);
        }
    }
}

/// Record the destination arrival time
pub fn stamp_destination(waypoints: &mut [Waypoint], at: DateTime<Utc>) {
    if let Some(destination) = waypoints.iter_mut().find(|w| w.is_destination) {
        destination.arrival_time = Some(at);
    }
}
