//! Wire format between the privileged side and the content process.
//!
//! Messages travel as JSON text inside `Message<String>` envelopes. Requests
//! use the `request` method, replies the `response` method.

use crate::geometry::FindResultGeometry;
use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u32 = 1;

/// The one query the content side answers.
pub const FIND_SELECTION_GEOMETRY: &str = "findSelectionGeometry";

pub const REQUEST_METHOD: &str = "request";
pub const RESPONSE_METHOD: &str = "response";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRequest {
    pub id: u64,
    pub version: u32,
    pub query: String,
}

impl ContentRequest {
    pub fn find_selection_geometry(id: u64) -> Self {
        Self {
            id,
            version: PROTOCOL_VERSION,
            query: FIND_SELECTION_GEOMETRY.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum QueryOutcome {
    Found { geometry: FindResultGeometry },
    NotFound,
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentResponse {
    pub id: u64,
    pub version: u32,
    pub outcome: QueryOutcome,
}

impl ContentResponse {
    pub fn new(id: u64, outcome: QueryOutcome) -> Self {
        Self {
            id,
            version: PROTOCOL_VERSION,
            outcome,
        }
    }
}

pub fn encode<T: Serialize>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string(value)
}

pub fn decode<'a, T: Deserialize<'a>>(text: &'a str) -> serde_json::Result<T> {
    serde_json::from_str(text)
}
