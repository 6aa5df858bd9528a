use std::{env::var, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Context as _, Result, anyhow};

const DEFAULT_ALPACA_BASE_API: &str = "https://data.alpaca.markets";

#[derive(Clone, Debug)]
pub struct Config {
    pub discord_token: String,
    pub alert_channel_id: u64,
    pub version: String,

    pub alpaca_base_api: String,
    pub alpaca_key_id: String,
    pub alpaca_secret: String,
    pub alpha_vantage_key: String,

    pub groq_api_key: String,
    pub groq_model: String,
    pub max_response_tokens: u32,

    pub alert_threshold: f64,
    pub monitor_interval: Duration,
    pub cache_ttl: Duration,
    pub primary_timeout: Duration,
    pub worker_pool_size: usize,

    pub web_host: String,
    pub web_port: u16,
    pub data_dir: PathBuf,
    pub charts_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| var(key).ok())
    }

    /// Builds the config from any key lookup; missing optional keys fall back
    /// to their defaults, malformed numbers are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| lookup(key).ok_or_else(|| anyhow!("{key} not set"));
        let or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            discord_token: required("DISCORD_TOKEN")?,
            alert_channel_id: parse(&lookup, "DISCORD_TARGET_CHANNEL_ID", None)?,
            version: or("APP_VERSION", "Unknown"),

            alpaca_base_api: or("APCA_API_BASE_URL", DEFAULT_ALPACA_BASE_API),
            alpaca_key_id: or("APCA_API_KEY_ID", ""),
            alpaca_secret: or("APCA_API_SECRET_KEY", ""),
            alpha_vantage_key: or("ALPHA_VANTAGE_API_KEY", "demo"),

            groq_api_key: required("GROQ_API_KEY")?,
            groq_model: or("GROQ_MODEL", stock::DEFAULT_GROQ_MODEL),
            max_response_tokens: parse(&lookup, "MAX_RESPONSE_TOKENS", Some(8000))?,

            alert_threshold: parse(&lookup, "PRICE_ALERT_THRESHOLD", Some(2.0))?,
            monitor_interval: Duration::from_secs(
                parse::<u64>(&lookup, "MONITOR_INTERVAL_MINUTES", Some(5))?
                    .max(1)
                    .checked_mul(60)
                    .ok_or_else(|| anyhow!("MONITOR_INTERVAL_MINUTES is too large"))?,
            ),
            cache_ttl: Duration::from_secs(parse(&lookup, "CACHE_TTL_SECS", Some(60))?),
            primary_timeout: Duration::from_secs(parse(&lookup, "PRIMARY_TIMEOUT_SECS", Some(15))?),
            worker_pool_size: parse(&lookup, "WORKER_POOL_SIZE", Some(4))?,

            web_host: or("WEB_HOST", "0.0.0.0"),
            web_port: parse(&lookup, "WEB_PORT", Some(5000))?,
            data_dir: PathBuf::from(or("DATA_DIR", "data")),
            charts_dir: PathBuf::from(or("CHARTS_DIR", "charts")),
        })
    }

    pub fn tracked_stocks_file(&self) -> PathBuf {
        self.data_dir.join("tracked_stocks.json")
    }

    pub fn user_preferences_file(&self) -> PathBuf {
        self.data_dir.join("user_preferences.json")
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: Option<T>) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        None => default.ok_or_else(|| anyhow!("{key} not set")),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("DISCORD_TOKEN", "token"),
        ("DISCORD_TARGET_CHANNEL_ID", "1234"),
        ("GROQ_API_KEY", "gsk"),
    ];

    #[test]
    fn defaults_fill_optional_keys() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();

        assert_eq!(config.alert_channel_id, 1234);
        assert_eq!(config.alpaca_base_api, DEFAULT_ALPACA_BASE_API);
        assert_eq!(config.alpha_vantage_key, "demo");
        assert_eq!(config.groq_model, "llama-3.3-70b-versatile");
        assert_eq!(config.max_response_tokens, 8000);
        assert_eq!(config.alert_threshold, 2.0);
        assert_eq!(config.monitor_interval, Duration::from_secs(300));
        assert_eq!(config.primary_timeout, Duration::from_secs(15));
        assert_eq!(config.web_port, 5000);
        assert_eq!(config.tracked_stocks_file(), PathBuf::from("data/tracked_stocks.json"));
    }

    #[test]
    fn overrides_are_parsed() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("PRICE_ALERT_THRESHOLD", "3.5"),
            ("MONITOR_INTERVAL_MINUTES", "1"),
            ("DATA_DIR", "/var/lib/bot"),
        ]);
        let config = Config::from_lookup(lookup(&pairs)).unwrap();

        assert_eq!(config.alert_threshold, 3.5);
        assert_eq!(config.monitor_interval, Duration::from_secs(60));
        assert_eq!(
            config.user_preferences_file(),
            PathBuf::from("/var/lib/bot/user_preferences.json")
        );
    }

    #[test]
    fn missing_token_is_an_error() {
        let err = Config::from_lookup(lookup(&REQUIRED[1..])).unwrap_err();
        assert!(err.to_string().contains("DISCORD_TOKEN"));
    }

    #[test]
    fn malformed_number_is_an_error() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("WEB_PORT", "http"));
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(err.to_string().contains("WEB_PORT"));
    }

    #[test]
    fn overflowing_interval_is_an_error() {
        let minutes = u64::MAX.to_string();
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("MONITOR_INTERVAL_MINUTES", &minutes));
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(err.to_string().contains("MONITOR_INTERVAL_MINUTES"));
    }
}
