// Cross-venue opportunity matching.
//
// Builds a lookup keyed by the non-SOL mint over one venue's snapshots,
// then scans the other venue's snapshots for matches on the same key.
// O(A+B) over the two snapshot sets, not O(A*B).

use std::collections::HashMap;
use tracing::{debug, warn};

use super::price::spread_pct;
use super::ArbitrageOpportunity;
use crate::config::MatcherConfig;
use crate::venue::PoolSnapshot;

/// Pairs Raydium and Meteora snapshots by shared non-SOL mint and applies
/// the spread band and liquidity floor.
pub struct OpportunityMatcher {
    config: MatcherConfig,
}

impl OpportunityMatcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    /// Match two independently fetched snapshot sets into opportunities.
    ///
    /// Every rejection logs the triggering filter and the numeric values
    /// involved so a near-miss can be diagnosed from the logs.
    pub fn match_snapshots(
        &self,
        raydium: &[PoolSnapshot],
        meteora: &[PoolSnapshot],
    ) -> Vec<ArbitrageOpportunity> {
        let meteora_by_token: HashMap<&str, &PoolSnapshot> = meteora
            .iter()
            .map(|pool| (pool.non_sol_token(), pool))
            .collect();
        // Secondary index by normalized pair name, only to surface symbol
        // collisions where the underlying mints differ.
        let meteora_by_name: HashMap<&str, &PoolSnapshot> = meteora
            .iter()
            .map(|pool| (pool.name.as_str(), pool))
            .collect();

        let mut opportunities = Vec::new();

        for ray_pool in raydium {
            let token_key = ray_pool.non_sol_token();
            let Some(met_pool) = meteora_by_token.get(token_key) else {
                // A pairing keyed on symbol instead of mint must never
                // slip through; when only the names line up, say so.
                if let Some(name_match) = meteora_by_name.get(ray_pool.name.as_str()) {
                    warn!(
                        pair = %ray_pool.name,
                        raydium_mint = token_key,
                        meteora_mint = name_match.non_sol_token(),
                        "pair name matches but token mints differ, rejecting pairing"
                    );
                }
                continue;
            };

            let spread = spread_pct(ray_pool.price, met_pool.price);

            if spread.abs() <= self.config.min_spread_pct {
                debug!(
                    pair = %ray_pool.name,
                    spread_pct = spread,
                    min = self.config.min_spread_pct,
                    "spread below admissible band"
                );
                continue;
            }
            if spread.abs() >= self.config.max_spread_pct {
                debug!(
                    pair = %ray_pool.name,
                    spread_pct = spread,
                    max = self.config.max_spread_pct,
                    "spread above admissible band, quote likely stale"
                );
                continue;
            }

            if ray_pool.liquidity < self.config.min_liquidity_usd
                || met_pool.liquidity < self.config.min_liquidity_usd
            {
                debug!(
                    pair = %ray_pool.name,
                    raydium_liquidity = ray_pool.liquidity,
                    meteora_liquidity = met_pool.liquidity,
                    floor = self.config.min_liquidity_usd,
                    "liquidity below floor"
                );
                continue;
            }

            opportunities.push(ArbitrageOpportunity {
                pair_name: ray_pool.name.clone(),
                raydium_pool_id: ray_pool.pool_id.clone(),
                meteora_pool_id: met_pool.pool_id.clone(),
                token_address: token_key.to_string(),
                expected_profit_pct: spread.abs(),
                // Canonical price is token per SOL, so the venue quoting
                // more token per SOL is the cheap venue for the token.
                buy_on_meteora: met_pool.price > ray_pool.price,
            });
        }

        debug!(
            raydium_pools = raydium.len(),
            meteora_pools = meteora.len(),
            matched = opportunities.len(),
            "matching pass complete"
        );

        opportunities
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::venue::{VenueId, WSOL_MINT};

    fn config() -> MatcherConfig {
        MatcherConfig {
            min_spread_pct: 0.5,
            max_spread_pct: 10.0,
            min_liquidity_usd: 1000.0,
            fetch_liquidity_floor_usd: 5000.0,
        }
    }

    fn pool(
        venue: VenueId,
        pool_id: &str,
        token: &str,
        price: f64,
        liquidity: f64,
    ) -> PoolSnapshot {
        PoolSnapshot {
            venue,
            pool_id: pool_id.to_string(),
            name: "WSOL/TEST".to_string(),
            token_a: WSOL_MINT.to_string(),
            token_b: token.to_string(),
            price,
            liquidity,
            is_sol_base: true,
            reserve_sol: None,
            reserve_token: None,
        }
    }

    const TOKEN: &str = "TokenMint1111111111111111111111111111111111";

    #[test]
    fn test_two_percent_spread_matches() {
        let matcher = OpportunityMatcher::new(config());
        let raydium = vec![pool(VenueId::Raydium, "r1", TOKEN, 102.0, 5000.0)];
        let meteora = vec![pool(VenueId::Meteora, "m1", TOKEN, 100.0, 8000.0)];

        let opps = matcher.match_snapshots(&raydium, &meteora);
        assert_eq!(opps.len(), 1);
        let opp = &opps[0];
        assert!((opp.expected_profit_pct - 2.0).abs() < 1e-9);
        // Raydium quotes more token per SOL: the token is cheaper there
        assert!(!opp.buy_on_meteora);
        assert_eq!(opp.token_address, TOKEN);
        assert_eq!(opp.raydium_pool_id, "r1");
        assert_eq!(opp.meteora_pool_id, "m1");
    }

    #[test]
    fn test_spread_band_boundaries() {
        let matcher = OpportunityMatcher::new(config());
        let meteora = vec![pool(VenueId::Meteora, "m1", TOKEN, 100.0, 8000.0)];

        // 0.3% spread: below the band
        let raydium = vec![pool(VenueId::Raydium, "r1", TOKEN, 100.3, 5000.0)];
        assert!(matcher.match_snapshots(&raydium, &meteora).is_empty());

        // 15% spread: above the band
        let raydium = vec![pool(VenueId::Raydium, "r1", TOKEN, 115.0, 5000.0)];
        assert!(matcher.match_snapshots(&raydium, &meteora).is_empty());

        // 2% spread: inside the band
        let raydium = vec![pool(VenueId::Raydium, "r1", TOKEN, 102.0, 5000.0)];
        assert_eq!(matcher.match_snapshots(&raydium, &meteora).len(), 1);
    }

    #[test]
    fn test_liquidity_floor_applies_to_both_legs() {
        let matcher = OpportunityMatcher::new(config());
        let raydium = vec![pool(VenueId::Raydium, "r1", TOKEN, 102.0, 900.0)];
        let meteora = vec![pool(VenueId::Meteora, "m1", TOKEN, 100.0, 8000.0)];
        assert!(matcher.match_snapshots(&raydium, &meteora).is_empty());

        let raydium = vec![pool(VenueId::Raydium, "r1", TOKEN, 102.0, 5000.0)];
        let meteora = vec![pool(VenueId::Meteora, "m1", TOKEN, 100.0, 900.0)];
        assert!(matcher.match_snapshots(&raydium, &meteora).is_empty());
    }

    #[test]
    fn test_matching_symbols_differing_mints_yield_nothing() {
        // Same pair name on both venues, different underlying mints: the
        // lookup is keyed by mint, so these must never pair up. The name
        // collision is logged as the rejection reason.
        let matcher = OpportunityMatcher::new(config());
        let raydium = vec![pool(VenueId::Raydium, "r1", TOKEN, 102.0, 5000.0)];
        let meteora = vec![pool(
            VenueId::Meteora,
            "m1",
            "OtherMint111111111111111111111111111111111",
            100.0,
            8000.0,
        )];
        assert!(matcher.match_snapshots(&raydium, &meteora).is_empty());
    }

    #[test]
    fn test_direction_buy_on_cheaper_venue() {
        let matcher = OpportunityMatcher::new(config());
        // Meteora quotes more token per SOL: the buy leg goes there
        let raydium = vec![pool(VenueId::Raydium, "r1", TOKEN, 100.0, 5000.0)];
        let meteora = vec![pool(VenueId::Meteora, "m1", TOKEN, 102.0, 8000.0)];
        let opps = matcher.match_snapshots(&raydium, &meteora);
        assert_eq!(opps.len(), 1);
        assert!(opps[0].buy_on_meteora);
    }
}
