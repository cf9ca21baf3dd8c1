//! # ipalloc common
//!
//! Types and pure helpers shared by every crate of the workspace:
//!
//! * **[`network`]**: address arithmetic (CIDR building and expansion, integer ids) and segments.
//! * **[`record`]**: the persisted inventory entry and the store predicates/field sets.
//! * **[`config`]**: process configuration read from the environment.
//! * **[`utils`]**: small address helpers.

pub mod config;
pub mod network;
pub mod record;
pub mod utils;
