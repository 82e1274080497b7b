//! Shared helpers for the command-line binaries

use crate::config::{load_config, load_config_from, Config};
use crate::error::Result;
use crate::persistence::open_store;
use crate::registry::Registry;
use chrono::DateTime;
use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber, honouring `RUST_LOG` and defaulting to `info`
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // a second call (e.g. from tests) keeps the first subscriber
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Load configuration (from `config_path` or `./config.toml`) and restore the
/// registry from the configured store.
pub fn load_registry_from_config(config_path: Option<&str>) -> Result<(Config, Registry)> {
    let config = match config_path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    let store = open_store(&config.storage)?;
    let registry = Registry::load_from(&config.ledger, store.as_ref())?;
    Ok((config, registry))
}

/// Abbreviate a hex hash for tables. Strings that are not plain ASCII
/// (only possible from a hand-edited snapshot) are shown as they are.
pub fn short_hash(hash: &str) -> String {
    match (hash.get(..8), hash.get(hash.len().saturating_sub(6)..)) {
        (Some(head), Some(tail)) if hash.len() > 16 => format!("{}...{}", head, tail),
        _ => hash.to_string(),
    }
}

/// Render a millisecond timestamp as UTC date and time
pub fn format_timestamp(millis: u64) -> String {
    match i64::try_from(millis).ok().and_then(DateTime::from_timestamp_millis) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        None => "Invalid".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_hash() {
        let hash = "0000abcdef0123456789abcdef0123456789";
        assert_eq!(short_hash(hash), "0000abcd...456789");
        assert_eq!(short_hash("00ab"), "00ab");
    }

    #[test]
    fn test_short_hash_non_ascii_is_not_split() {
        let odd_head = "xéééééééé";
        assert_eq!(short_hash(odd_head), odd_head);
        let odd_tail = "éééééééééx";
        assert_eq!(short_hash(odd_tail), odd_tail);
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00");
        assert_eq!(format_timestamp(1_725_235_200_000), "2024-09-02 00:00");
    }
}
