use serde::{Deserialize, Serialize};

/// One named sub-indicator inside a pillar.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawScoreComponent {
    pub key: String,
    pub score: f64,
}

/// One scoring category. Sentiment, technical and economic are expected by
/// convention, but the set is not restricted here; unrecognized names are
/// dropped during transformation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawPillar {
    pub name: String,
    pub score: f64,
    pub components: Vec<RawScoreComponent>,
}

/// The provider's per-asset payload as decoded off the wire.
/// `scale` is an ordered `[min, max]` pair; scores are expected within it
/// but out-of-range values are not rejected, they pass through the
/// normalizer's comparison rules as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAssetResponse {
    pub asset: String,
    pub score: f64,
    pub scale: [f64; 2],
    pub pillars: Vec<RawPillar>,
    pub as_of: String,
    pub version: String,
}
