//! Per-slug view counters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentMeta {
    pub id: i64,
    /// Any content slug, e.g. `blog/hello-world`
    pub slug: String,
    pub views: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
