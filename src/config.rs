//! Ledger configuration
//!
//! Plain data with serde support so the host application can embed it in its
//! own configuration file. Every field has a default; `LedgerConfig::default()`
//! is suitable for production use.

use serde::Deserialize;

/// Tunables for the ledger engine
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Maximum attempts to acquire a user's wallet lock before settlement
    /// gives up with `ContentionRetryExhausted`
    pub settle_max_attempts: u32,

    /// Backoff between wallet lock attempts, in milliseconds
    pub settle_retry_backoff_ms: u64,

    /// Page size used when a listing request does not specify one
    pub default_page_size: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            settle_max_attempts: 16,
            settle_retry_backoff_ms: 2,
            default_page_size: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::default();
        assert_eq!(config.settle_max_attempts, 16);
        assert_eq!(config.settle_retry_backoff_ms, 2);
        assert_eq!(config.default_page_size, 10);
    }

    #[test]
    fn test_partial_deserialization_fills_defaults() {
        let config: LedgerConfig =
            serde_json::from_str(r#"{"settle_max_attempts": 4}"#).unwrap();
        assert_eq!(config.settle_max_attempts, 4);
        assert_eq!(config.default_page_size, 10);
    }
}
