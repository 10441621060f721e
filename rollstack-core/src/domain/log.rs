//! Log domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One line of driver output
///
/// Logs are ordered by `(created_at, id)`; ids are UUID v7 so they sort in
/// creation order as well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Log {
    pub id: Uuid,
    pub stack_id: Uuid,
    pub deployment_id: Uuid,
    pub message: String,
    pub created_at: DateTime<Utc>,
}
