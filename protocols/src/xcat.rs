//! Decoding of the xCAT `networks` resource.
//!
//! The API answers with one JSON object whose keys are network names and whose
//! values describe the network. Only `net` and `mask` are used; everything else
//! is ignored.

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use ipalloc_common::network::segment::Segment;

pub const NETWORKS_PATH: &str = "xcatws/networks/ALLRESOURCES";
pub const AUTH_HEADER: &str = "X-Auth-Token";

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed networks document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("networks document is not an object")]
    NotAnObject,
}

#[derive(Debug, Deserialize)]
struct NetworkObject {
    net: String,
    mask: String,
}

/// Decodes the `networks` document into segments sorted by name.
///
/// Entries without a usable `net`/`mask` pair are skipped with a warning.
pub fn decode_networks(body: &[u8]) -> Result<Vec<Segment>, DecodeError> {
    let document: Value = serde_json::from_slice(body)?;
    let Value::Object(objects) = document else {
        return Err(DecodeError::NotAnObject);
    };
    Ok(segments_from(objects))
}

fn segments_from(objects: Map<String, Value>) -> Vec<Segment> {
    let mut segments: Vec<Segment> = objects
        .into_iter()
        .filter_map(|(name, value)| match serde_json::from_value::<NetworkObject>(value) {
            Ok(obj) => Some(Segment::new(name, obj.net, obj.mask)),
            Err(e) => {
                warn!(segment = %name, "skipping network object: {e}");
                None
            }
        })
        .collect();

    segments.sort_by(|a, b| a.name.cmp(&b.name));
    segments
}
