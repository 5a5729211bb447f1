// Pre-submission profit guard.
//
// The guard runs off-chain, after both legs are quoted and before the
// transaction is finalized. An instruction that always succeeds on-chain
// would enforce nothing, so the decision is made here and a failing
// attempt is aborted outright instead of being submitted best-effort.

use tracing::{debug, warn};

use crate::error::ArbError;

/// Binary proceed/abort check over the realized (or simulated) output of
/// a full arbitrage cycle.
#[derive(Clone, Debug)]
pub struct ProfitGuard {
    min_profit_bps: u64,
    max_price_impact_bps: u64,
}

impl ProfitGuard {
    pub fn new(min_profit_bps: u64, max_price_impact_bps: u64) -> Self {
        Self {
            min_profit_bps,
            max_price_impact_bps,
        }
    }

    /// Minimum acceptable final amount for a given initial amount:
    /// `initial * (1 + min_profit_bps / 10_000)`.
    pub fn minimum_required_output(&self, initial_amount: f64) -> f64 {
        initial_amount * (1.0 + self.min_profit_bps as f64 / 10_000.0)
    }

    /// Decide whether the attempt proceeds to submission. Never partially
    /// executes: either the full transaction goes out or nothing does.
    pub fn check_profit(&self, initial_amount: f64, final_amount: f64) -> Result<(), ArbError> {
        let required = self.minimum_required_output(initial_amount);
        if final_amount > required {
            debug!(
                initial = initial_amount,
                realized = final_amount,
                required,
                "profit guard passed"
            );
            Ok(())
        } else {
            warn!(
                initial = initial_amount,
                realized = final_amount,
                required,
                min_profit_bps = self.min_profit_bps,
                "profit guard failed, aborting submission"
            );
            Err(ArbError::InsufficientProfit {
                initial: initial_amount,
                realized: final_amount,
                required,
                min_profit_bps: self.min_profit_bps,
            })
        }
    }

    /// Reject a leg whose estimated price impact exceeds the ceiling.
    /// Runs before instruction building: a doomed trade should not spend
    /// compute budget.
    pub fn check_price_impact(&self, pool_id: &str, impact_bps: u64) -> Result<(), ArbError> {
        if impact_bps > self.max_price_impact_bps {
            warn!(
                pool_id,
                impact_bps,
                max_bps = self.max_price_impact_bps,
                "price impact above ceiling, aborting assembly"
            );
            return Err(ArbError::PriceImpactExceeded {
                pool_id: pool_id.to_string(),
                impact_bps,
                max_bps: self.max_price_impact_bps,
            });
        }
        Ok(())
    }
}
