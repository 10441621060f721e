//! Log DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::log::Log;

/// Default number of rows returned by a log page
pub const DEFAULT_LOG_LIMIT: u32 = 100;

/// Largest page a caller may ask for
pub const MAX_LOG_LIMIT: u32 = 1000;

/// Forward cursor query over logs
///
/// Without `afterId` the most recent `limit` rows are returned in ascending
/// order. With it, up to `limit` rows strictly after that row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_id: Option<Uuid>,
}

impl LogQuery {
    /// Limit clamped to `1..=MAX_LOG_LIMIT`
    pub fn effective_limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_LOG_LIMIT)
            .clamp(1, MAX_LOG_LIMIT)
    }
}

/// One page of logs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogPage {
    pub logs: Vec<Log>,
    /// Id to pass as `afterId` to continue reading, if the page had rows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Uuid>,
}

impl LogPage {
    pub fn new(logs: Vec<Log>) -> Self {
        let next_cursor = logs.last().map(|log| log.id);
        Self { logs, next_cursor }
    }
}
