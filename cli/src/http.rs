//! JSON transport of the allocation API.
//!
//! Allocation failures are part of the response body, never of the status
//! code: both endpoints answer `200` whenever the request body decodes.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use ipalloc_core::allocation::Allocator;

pub type SharedAllocator = Arc<dyn Allocator>;

#[derive(Debug, Deserialize)]
pub struct ReserveRequest {
    pub vlan: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ReserveResponse {
    pub ipaddr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReleaseRequest {
    pub ip: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ReleaseResponse {
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
}

pub fn router(allocator: SharedAllocator) -> Router {
    Router::new()
        .route("/reserve", post(reserve))
        .route("/release", post(release))
        .with_state(allocator)
}

async fn reserve(
    State(allocator): State<SharedAllocator>,
    Json(req): Json<ReserveRequest>,
) -> Json<ReserveResponse> {
    Json(match allocator.reserve(&req.vlan).await {
        Ok(ipaddr) => ReserveResponse { ipaddr, err: None },
        Err(e) => ReserveResponse {
            ipaddr: String::new(),
            err: Some(e.to_string()),
        },
    })
}

async fn release(
    State(allocator): State<SharedAllocator>,
    Json(req): Json<ReleaseRequest>,
) -> Json<ReleaseResponse> {
    Json(match allocator.release(&req.ip).await {
        Ok(msg) => ReleaseResponse { msg, err: None },
        Err(e) => ReleaseResponse {
            msg: String::new(),
            err: Some(e.to_string()),
        },
    })
}
