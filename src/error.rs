use thiserror::Error;

/// Error taxonomy for the arbitrage engine.
///
/// Guard and filter variants carry the numeric values involved so an
/// operator can diagnose a near-miss opportunity from the error alone.
#[derive(Debug, Error)]
pub enum ArbError {
    /// A venue reported a zero or non-finite price. Never coerced to zero.
    #[error("invalid quote: raw price {raw} from {venue}")]
    InvalidQuote { venue: &'static str, raw: f64 },

    /// Venue pair API could not be reached; callers fall back to the last
    /// cached snapshot set.
    #[error("{venue} snapshot provider unavailable: {source}")]
    ProviderUnavailable {
        venue: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("pool not found: {pool_id}")]
    PoolNotFound { pool_id: String },

    #[error("quote unavailable for pool {pool_id}: {reason}")]
    QuoteUnavailable { pool_id: String, reason: String },

    #[error("price impact {impact_bps} bps exceeds ceiling {max_bps} bps on pool {pool_id}")]
    PriceImpactExceeded {
        pool_id: String,
        impact_bps: u64,
        max_bps: u64,
    },

    #[error(
        "insufficient profit: realized {realized} < required {required} \
         (initial {initial}, min {min_profit_bps} bps)"
    )]
    InsufficientProfit {
        initial: f64,
        realized: f64,
        required: f64,
        min_profit_bps: u64,
    },

    #[error("network timeout after {timeout_ms} ms: {operation}")]
    NetworkTimeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    #[error("relay rejected transaction: {message}")]
    RelayRejected { message: String },

    /// The blockhash validity window elapsed before submission completed.
    /// Terminal: requires a fresh assembly cycle, never a resubmission.
    #[error("transaction expired: blockhash no longer valid")]
    Expired,

    #[error("configuration missing: {0}")]
    ConfigurationMissing(&'static str),
}

impl ArbError {
    /// Whether a fresh attempt (new snapshots, new assembly) may succeed.
    /// Identical serialized bytes must never be resubmitted.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ArbError::ProviderUnavailable { .. }
                | ArbError::QuoteUnavailable { .. }
                | ArbError::NetworkTimeout { .. }
                | ArbError::Expired
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ArbError::Expired.is_retryable());
        assert!(ArbError::NetworkTimeout {
            operation: "blockhash",
            timeout_ms: 5000
        }
        .is_retryable());

        assert!(!ArbError::InsufficientProfit {
            initial: 1.0,
            realized: 1.001,
            required: 1.005,
            min_profit_bps: 50
        }
        .is_retryable());
        assert!(!ArbError::ConfigurationMissing("RELAY_API_KEY").is_retryable());
    }

    #[test]
    fn test_guard_error_carries_numbers() {
        let err = ArbError::InsufficientProfit {
            initial: 1.0,
            realized: 1.0049,
            required: 1.005,
            min_profit_bps: 50,
        };
        let msg = err.to_string();
        assert!(msg.contains("1.0049"));
        assert!(msg.contains("50 bps"));
    }
}
