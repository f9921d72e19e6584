use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Five-level qualitative classification of an asset's total score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bias {
    VeryBullish,
    Bullish,
    Neutral,
    Bearish,
    VeryBearish,
}

/// Display-ready record for one asset. Immutable once produced; each
/// successful refresh cycle supersedes it wholesale, never field-by-field.
///
/// The three maps carry normalized buckets in `{-2,-1,0,1,2}` keyed by
/// component name; `score` is the provider's raw total, never normalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayAsset {
    pub asset: String,
    pub bias: Bias,
    pub score: f64,
    pub sentiment: HashMap<String, i8>,
    pub technical: HashMap<String, i8>,
    pub economic: HashMap<String, i8>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub last_updated: DateTime<Utc>,
}
