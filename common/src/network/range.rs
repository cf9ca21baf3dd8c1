//! # Address space arithmetic
//!
//! Pure conversions between the textual network descriptions handed out by the
//! segment source and the addresses the scanner works on:
//!
//! * `net` + `mask` into `net/prefix` notation ([`cidr_for`]).
//! * A CIDR block into its usable host addresses ([`expand`]).
//! * Dotted-decimal addresses to and from their big-endian `u32` identifier
//!   ([`to_id`], [`to_address`]).

use std::net::Ipv4Addr;
use std::str::FromStr;

use pnet::ipnetwork::Ipv4Network;

use super::AddressError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Range {
    pub start_addr: Ipv4Addr,
    pub end_addr: Ipv4Addr,
}

impl Ipv4Range {
    pub fn new(start_addr: Ipv4Addr, end_addr: Ipv4Addr) -> Self {
        Self {
            start_addr,
            end_addr,
        }
    }
}

/// Full block of a CIDR, network and broadcast addresses included.
pub fn cidr_range(cidr: &str) -> Result<Ipv4Range, AddressError> {
    if !cidr.contains('/') {
        return Err(AddressError::InvalidCidr(cidr.to_string()));
    }
    let network = Ipv4Network::from_str(cidr.trim())
        .map_err(|_| AddressError::InvalidCidr(cidr.to_string()))?;

    Ok(Ipv4Range::new(network.network(), network.broadcast()))
}

/// Combines a base address and a dotted-decimal netmask into `address/prefix`.
///
/// The mask must be contiguous (`255.255.240.0` is fine, `255.0.255.0` is not).
pub fn cidr_for(base_addr: &str, netmask: &str) -> Result<String, AddressError> {
    let base: Ipv4Addr = base_addr
        .trim()
        .parse()
        .map_err(|_| AddressError::InvalidCidr(base_addr.to_string()))?;
    let prefix: u32 = mask_to_prefix(netmask)?;

    Ok(format!("{base}/{prefix}"))
}

fn mask_to_prefix(netmask: &str) -> Result<u32, AddressError> {
    let mask: Ipv4Addr = netmask
        .trim()
        .parse()
        .map_err(|_| AddressError::InvalidMask(netmask.to_string()))?;

    let bits: u32 = mask.into();
    let prefix: u32 = bits.leading_ones();
    // Anything left after shifting out the leading ones is a hole in the mask.
    if bits.checked_shl(prefix).unwrap_or(0) != 0 {
        return Err(AddressError::InvalidMask(netmask.to_string()));
    }
    Ok(prefix)
}

/// Usable host addresses of a CIDR block, lowest first.
///
/// The network and broadcast addresses are dropped, so blocks holding two
/// addresses or fewer (`/31`, `/32`) expand to nothing.
pub fn expand(cidr: &str) -> Result<Vec<String>, AddressError> {
    Ok(expand_addrs(cidr)?.map(|addr| addr.to_string()).collect())
}

/// Same as [`expand`] without the string conversion.
pub fn expand_addrs(cidr: &str) -> Result<impl Iterator<Item = Ipv4Addr> + use<>, AddressError> {
    let range: Ipv4Range = cidr_range(cidr)?;
    let first: u32 = range.start_addr.into();
    let last: u32 = range.end_addr.into();

    #[allow(clippy::reversed_empty_ranges)]
    let hosts = if last - first >= 2 {
        (first + 1)..=(last - 1)
    } else {
        1..=0
    };
    Ok(hosts.map(Ipv4Addr::from))
}

pub fn to_id(addr: &str) -> Result<u32, AddressError> {
    addr.parse::<Ipv4Addr>()
        .map(u32::from)
        .map_err(|_| AddressError::InvalidAddress(addr.to_string()))
}

pub fn to_address(id: u32) -> String {
    Ipv4Addr::from(id).to_string()
}
