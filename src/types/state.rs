use chrono::{DateTime, Utc};
use serde::Serialize;

use super::display::DisplayAsset;

/// Controller lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollPhase {
    Idle,
    Loading,
    Ready,
    Errored,
    Stopped,
}

/// Snapshot of the poll loop as published to observers.
///
/// Owned exclusively by the controller and replaced wholesale on each
/// transition; observers only ever see complete snapshots. `data` holds
/// only assets whose most recent fetch succeeded and transformed; a
/// failing asset is absent, never a placeholder.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollState {
    pub data: Vec<DisplayAsset>,
    pub loading: bool,
    pub error: Option<String>,
    #[serde(with = "chrono::serde::ts_seconds_option")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl PollState {
    /// State as it exists at controller creation: empty and loading.
    pub fn initial() -> Self {
        Self {
            data: Vec::new(),
            loading: true,
            error: None,
            last_updated: None,
        }
    }
}
