pub mod range;
pub mod segment;

use thiserror::Error;

/// Malformed network descriptions and addresses.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum AddressError {
    #[error("invalid netmask: {0}")]
    InvalidMask(String),
    #[error("invalid CIDR: {0}")]
    InvalidCidr(String),
    #[error("invalid ip: {0}")]
    InvalidAddress(String),
}
