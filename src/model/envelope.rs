use serde::{Deserialize, Serialize};

/// `{"data": ...}` wrapper around every backend reply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// `{"items": [...]}` list payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Items<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}
