use serde::{Deserialize, Serialize};

use super::AddressError;
use super::range;

/// A named IPv4 network as described by the segment source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub name: String,
    /// Dotted-decimal base address (`net`).
    pub base_addr: String,
    /// Dotted-decimal netmask (`mask`).
    pub netmask: String,
}

impl Segment {
    pub fn new(name: impl Into<String>, base_addr: impl Into<String>, netmask: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_addr: base_addr.into(),
            netmask: netmask.into(),
        }
    }

    pub fn cidr(&self) -> Result<String, AddressError> {
        range::cidr_for(&self.base_addr, &self.netmask)
    }
}
