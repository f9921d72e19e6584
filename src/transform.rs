use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::FetchError;
use crate::score::{classify_bias, normalize_score};
use crate::types::display::DisplayAsset;
use crate::types::raw::RawAssetResponse;

/// Turn one validated response into its display record.
///
/// Components are bucketed against the response's own scale and routed by
/// case-insensitive pillar name; pillars outside the three known
/// categories are skipped whole. Duplicate component keys within a pillar
/// keep the last value seen. An `as_of` that does not parse as RFC 3339
/// is an error, never a silent default.
pub fn to_display_asset(response: &RawAssetResponse) -> Result<DisplayAsset, FetchError> {
    let last_updated = DateTime::parse_from_rfc3339(&response.as_of)
        .map_err(|e| FetchError::Transform(format!("bad as_of `{}`: {}", response.as_of, e)))?
        .with_timezone(&Utc);

    let mut sentiment = HashMap::new();
    let mut technical = HashMap::new();
    let mut economic = HashMap::new();

    for pillar in &response.pillars {
        let target = match pillar.name.to_ascii_lowercase().as_str() {
            "sentiment" => &mut sentiment,
            "technical" => &mut technical,
            "economic" => &mut economic,
            _ => continue,
        };
        for component in &pillar.components {
            target.insert(
                component.key.clone(),
                normalize_score(component.score, response.scale),
            );
        }
    }

    Ok(DisplayAsset {
        asset: response.asset.clone(),
        bias: classify_bias(response.score),
        score: response.score,
        sentiment,
        technical,
        economic,
        last_updated,
    })
}
