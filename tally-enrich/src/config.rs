//! Enrichment configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tally_core::constants::{DEFAULT_ENRICH_MEMO_TTL_MS, ENV_ENRICH_MEMO_TTL_MS};
use tally_core::{ConfigError, TallyResult};

/// Configuration for the [`Enricher`](crate::Enricher).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichConfig {
    /// How long resolved labels are reused without a new reverse lookup
    /// (default: 5 seconds)
    pub memo_ttl: Duration,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            memo_ttl: Duration::from_millis(DEFAULT_ENRICH_MEMO_TTL_MS),
        }
    }
}

impl EnrichConfig {
    /// Create EnrichConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `TALLY_ENRICH_MEMO_TTL_MS`: Memo window in milliseconds (default: 5000)
    pub fn from_env() -> Self {
        let memo_ttl = std::env::var(ENV_ENRICH_MEMO_TTL_MS)
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or_else(|| Self::default().memo_ttl);

        Self { memo_ttl }
    }

    /// Set the memo window.
    pub fn with_memo_ttl(mut self, memo_ttl: Duration) -> Self {
        self.memo_ttl = memo_ttl;
        self
    }

    /// The memo window as a signed duration, saturating for huge values.
    pub(crate) fn memo_window(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.memo_ttl).unwrap_or(chrono::Duration::MAX)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> TallyResult<()> {
        if self.memo_ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "memo_ttl".to_string(),
                value: format!("{:?}", self.memo_ttl),
                reason: "must be positive".to_string(),
            }
            .into());
        }
        Ok(())
    }
}
