// Opportunity ranking: stable descending sort by expected profit,
// truncated to the configured top-N.

use tracing::debug;

use super::ArbitrageOpportunity;

/// Sort candidates descending by expected profit and keep the best N.
///
/// The sort is stable: candidates with equal profit keep their original
/// relative order, so repeated ranking passes over the same input are
/// deterministic.
pub fn rank_opportunities(
    mut opportunities: Vec<ArbitrageOpportunity>,
    top_n: usize,
) -> Vec<ArbitrageOpportunity> {
    opportunities.sort_by(|a, b| {
        b.expected_profit_pct
            .partial_cmp(&a.expected_profit_pct)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    opportunities.truncate(top_n);

    debug!(kept = opportunities.len(), top_n, "ranking pass complete");
    opportunities
}
