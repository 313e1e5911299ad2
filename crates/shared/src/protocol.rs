use serde::{Deserialize, Serialize};

/// Body returned by the transform service for a successful decode.
/// Records are kept as raw JSON values; their per-item layout belongs to
/// the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodeResponse {
    pub count: u64,
    pub records: Vec<serde_json::Value>,
}

/// Body returned by the service liveness endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}
