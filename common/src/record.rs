//! # Inventory records
//!
//! One [`AddressRecord`] exists per IPv4 host address ever observed by a scan.
//! Stores are addressed through [`RecordFilter`] predicates and mutated through
//! [`FieldUpdate`] field sets, so that every backend can express a change as a
//! single document operation.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::network::range;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRecord {
    /// Big-endian `u32` value of [`Self::address`]. Primary key.
    pub id: u32,
    pub segment_name: String,
    pub address: String,
    /// CIDR of the owning segment when the address was first seen.
    pub cidr: String,
    /// Base address of that segment as the source lists it.
    pub network: String,
    pub alive: bool,
    pub reserved: bool,
    /// Administrative hold, never written by a scan.
    pub locked: bool,
    /// Empty when the address has no reverse name.
    pub ptr_name: String,
}

impl AddressRecord {
    /// Skeleton handed to the probers: flags cleared, no reverse name yet.
    pub fn skeleton(addr: Ipv4Addr, segment_name: &str, cidr: &str) -> Self {
        Self {
            id: u32::from(addr),
            segment_name: segment_name.to_string(),
            address: range::to_address(u32::from(addr)),
            cidr: cidr.to_string(),
            network: cidr.split_once('/').map_or(cidr, |(net, _)| net).to_string(),
            alive: false,
            reserved: false,
            locked: false,
            ptr_name: String::new(),
        }
    }

    pub fn ip(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.id)
    }

    /// Free for allocation: not alive, not locked, not reserved.
    pub fn is_available(&self) -> bool {
        !self.alive && !self.locked && !self.reserved
    }
}

/// Conjunction of optional field equalities. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub id: Option<u32>,
    pub segment_name: Option<String>,
    pub alive: Option<bool>,
    pub reserved: Option<bool>,
    pub locked: Option<bool>,
}

impl RecordFilter {
    pub fn by_id(id: u32) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }

    pub fn by_segment(segment_name: impl Into<String>) -> Self {
        Self {
            segment_name: Some(segment_name.into()),
            ..Default::default()
        }
    }

    /// Records of `segment_name` that may be handed out by a reservation.
    pub fn available_in(segment_name: impl Into<String>) -> Self {
        Self {
            segment_name: Some(segment_name.into()),
            alive: Some(false),
            reserved: Some(false),
            locked: Some(false),
            ..Default::default()
        }
    }

    pub fn matches(&self, record: &AddressRecord) -> bool {
        self.id.is_none_or(|id| record.id == id)
            && self
                .segment_name
                .as_deref()
                .is_none_or(|name| record.segment_name == name)
            && self.alive.is_none_or(|alive| record.alive == alive)
            && self.reserved.is_none_or(|reserved| record.reserved == reserved)
            && self.locked.is_none_or(|locked| record.locked == locked)
    }
}

/// Set of fields to overwrite. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldUpdate {
    pub alive: Option<bool>,
    pub ptr_name: Option<String>,
    pub reserved: Option<bool>,
    pub locked: Option<bool>,
}

impl FieldUpdate {
    /// The fields a scan pass is allowed to refresh.
    pub fn observation(alive: bool, ptr_name: impl Into<String>) -> Self {
        Self {
            alive: Some(alive),
            ptr_name: Some(ptr_name.into()),
            ..Default::default()
        }
    }

    pub fn reserved(reserved: bool) -> Self {
        Self {
            reserved: Some(reserved),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.alive.is_none()
            && self.ptr_name.is_none()
            && self.reserved.is_none()
            && self.locked.is_none()
    }

    pub fn apply_to(&self, record: &mut AddressRecord) {
        if let Some(alive) = self.alive {
            record.alive = alive;
        }
        if let Some(ptr_name) = &self.ptr_name {
            record.ptr_name.clone_from(ptr_name);
        }
        if let Some(reserved) = self.reserved {
            record.reserved = reserved;
        }
        if let Some(locked) = self.locked {
            record.locked = locked;
        }
    }
}
