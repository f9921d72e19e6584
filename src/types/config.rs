use std::env;
use std::str::FromStr;

/// Runtime configuration, read from the environment after `.env` loading.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Base URL of the scoring endpoint.
    pub base_url: String,
    /// Asset symbols to poll, upcased.
    pub assets: Vec<String>,
    /// Refresh period in milliseconds; 0 disables recurring refresh.
    pub refresh_ms: u64,
    /// Additional fetch attempts after the first failure.
    pub max_retries: u32,
    /// Serve canned fixture data instead of calling the endpoint.
    pub use_fixtures: bool,
}

impl WatchConfig {
    pub fn from_env() -> Result<Self, String> {
        let use_fixtures = env::var("HEATWATCH_USE_FIXTURES")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        let base_url = match env::var("HEATWATCH_BASE_URL") {
            Ok(url) => url.trim_end_matches('/').to_string(),
            Err(_) if use_fixtures => String::new(),
            Err(_) => return Err("HEATWATCH_BASE_URL not set".to_string()),
        };

        let assets = env::var("HEATWATCH_ASSETS")
            .map(|v| parse_assets(&v))
            .map_err(|_| "HEATWATCH_ASSETS not set".to_string())?;
        if assets.is_empty() {
            return Err("HEATWATCH_ASSETS is empty".to_string());
        }

        Ok(Self {
            base_url,
            assets,
            refresh_ms: parse_or_default("HEATWATCH_REFRESH_MS", 0)?,
            max_retries: parse_or_default("HEATWATCH_MAX_RETRIES", 3)?,
            use_fixtures,
        })
    }
}

/// Split a comma-separated symbol list, trimming and upcasing entries.
pub fn parse_assets(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

fn parse_or_default<T: FromStr>(key: &str, default: T) -> Result<T, String> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| format!("{} is not a valid number: {}", key, raw)),
        Err(_) => Ok(default),
    }
}
