use serde::{Deserialize, Serialize};

/// Error body the transform service attaches to non-2xx responses.
/// `detail` is optional: proxies and crashes can produce bodies without it,
/// and callers fall back to the bare status code in that case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub detail: Option<String>,
}
