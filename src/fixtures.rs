use async_trait::async_trait;
use serde_json::{json, Value};

use crate::client::ScoreSource;
use crate::error::FetchError;

/// Canned in-memory source honoring the same contract as the HTTP
/// endpoint. Selected with `HEATWATCH_USE_FIXTURES`; also handy in tests
/// that need deterministic payloads without a live endpoint.
pub struct FixtureSource;

#[async_trait]
impl ScoreSource for FixtureSource {
    async fn fetch_raw(&self, symbol: &str) -> Result<Value, FetchError> {
        fixture_payload(symbol).ok_or(FetchError::Http { status: 404 })
    }
}

/// Symbols the fixture set knows about, spanning all five bias levels.
pub const FIXTURE_SYMBOLS: [&str; 5] = ["EURUSD", "XAUUSD", "USDJPY", "GBPUSD", "BTCUSD"];

/// The canned payload for one symbol, or `None` for unknown symbols
/// (surfaced as a 404 by the source).
pub fn fixture_payload(symbol: &str) -> Option<Value> {
    let (score, sentiment, technical, economic) = match symbol {
        "EURUSD" => (18.0, [6.0, 5.0], [4.0, 3.0], [0.0]),
        "XAUUSD" => (10.0, [4.0, 2.0], [3.0, 1.0], [0.0]),
        "USDJPY" => (1.0, [1.0, -1.0], [2.0, -2.0], [1.0]),
        "GBPUSD" => (-10.0, [-4.0, -2.0], [-3.0, -1.0], [0.0]),
        "BTCUSD" => (-18.0, [-6.0, -5.0], [-4.0, -3.0], [0.0]),
        _ => return None,
    };

    Some(json!({
        "asset": symbol,
        "score": score,
        "scale": [-24, 24],
        "pillars": [
            {
                "name": "sentiment",
                "score": sentiment[0] + sentiment[1],
                "components": [
                    {"key": "cot", "score": sentiment[0]},
                    {"key": "retailPos", "score": sentiment[1]}
                ]
            },
            {
                "name": "technical",
                "score": technical[0] + technical[1],
                "components": [
                    {"key": "trend", "score": technical[0]},
                    {"key": "momentum", "score": technical[1]}
                ]
            },
            {
                "name": "economic",
                "score": economic[0],
                "components": [
                    {"key": "gdp", "score": economic[0]}
                ]
            }
        ],
        "as_of": "2026-01-15T09:30:00Z",
        "version": "1"
    }))
}
