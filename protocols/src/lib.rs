//! Wire formats spoken by the scanner: reverse DNS queries and the segment
//! inventory document.

pub mod dns;
pub mod xcat;
