// Opportunity detection: price normalization, cross-venue matching,
// ranking, and the pre-submission profit guard.

pub mod guard;
pub mod matcher;
pub mod price;
pub mod ranker;

use serde::{Deserialize, Serialize};

pub use guard::ProfitGuard;
pub use matcher::OpportunityMatcher;
pub use ranker::rank_opportunities;

/// A detected cross-venue price discrepancy worth trading.
///
/// Invariant: `token_address` was resolved independently from both legs
/// and matched; the matcher rejects pairs whose non-SOL mints differ.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArbitrageOpportunity {
    /// Normalized pair name, e.g. `WSOL/BONK`
    pub pair_name: String,
    pub raydium_pool_id: String,
    pub meteora_pool_id: String,
    /// Mint address of the non-SOL token, identical across both legs
    pub token_address: String,
    /// Expected profit as the absolute spread, in percent
    pub expected_profit_pct: f64,
    /// True when Meteora is the cheaper venue (buy there, sell on Raydium)
    pub buy_on_meteora: bool,
}

impl ArbitrageOpportunity {
    /// Expected profit in basis points
    pub fn expected_profit_bps(&self) -> u64 {
        (self.expected_profit_pct * 100.0).round() as u64
    }

    pub fn direction_label(&self) -> &'static str {
        if self.buy_on_meteora {
            "Buy Meteora -> Sell Raydium"
        } else {
            "Buy Raydium -> Sell Meteora"
        }
    }
}

/// An opportunity selected for execution with an operator-supplied size.
/// Consumed exactly once by the transaction assembler.
#[derive(Clone, Debug)]
pub struct ArbitrageExecution {
    pub opportunity: ArbitrageOpportunity,
    /// Trade size in SOL
    pub amount_in_sol: f64,
}

impl ArbitrageExecution {
    pub fn new(opportunity: ArbitrageOpportunity, amount_in_sol: f64) -> Self {
        Self {
            opportunity,
            amount_in_sol,
        }
    }

    pub fn amount_in_lamports(&self) -> u64 {
        (self.amount_in_sol * 1e9) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profit_bps_conversion() {
        let opp = ArbitrageOpportunity {
            pair_name: "WSOL/BONK".to_string(),
            raydium_pool_id: "r1".to_string(),
            meteora_pool_id: "m1".to_string(),
            token_address: "tok".to_string(),
            expected_profit_pct: 2.0,
            buy_on_meteora: true,
        };
        assert_eq!(opp.expected_profit_bps(), 200);
    }

    #[test]
    fn test_lamports_conversion() {
        let opp = ArbitrageOpportunity {
            pair_name: "WSOL/BONK".to_string(),
            raydium_pool_id: "r1".to_string(),
            meteora_pool_id: "m1".to_string(),
            token_address: "tok".to_string(),
            expected_profit_pct: 1.0,
            buy_on_meteora: false,
        };
        let exec = ArbitrageExecution::new(opp, 0.1);
        assert_eq!(exec.amount_in_lamports(), 100_000_000);
    }
}
