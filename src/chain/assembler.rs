// Transaction assembly for one arbitrage attempt.
//
// Produces the ordered instruction sequence the atomicity contract
// depends on: compute budget first, then the buy leg, then the sell leg,
// then (only after the profit guard has passed) the relay tip transfer.
// The guard itself is an off-chain pre-submission decision; a failing
// attempt never produces a transaction at all, so no speculative
// transaction with an unconditional tip transfer ever exists.

use solana_sdk::{
    compute_budget::ComputeBudgetInstruction, instruction::Instruction, pubkey::Pubkey,
    system_instruction,
};
use std::sync::Arc;
use tracing::{debug, info};

use super::AttemptPhase;
use crate::arbitrage::{ArbitrageExecution, ProfitGuard};
use crate::cache::CachedOpportunity;
use crate::config::{BotConfig, ExecutionConfig, RelayConfig};
use crate::error::ArbError;
use crate::venue::{PoolSnapshot, SwapDirection, VenueClient};

/// A fully assembled, not yet finalized instruction sequence.
///
/// Built fresh per execution attempt and consumed exactly once by the
/// submitter; the blockhash attached at finalization time makes replay
/// of the same bytes fail once that handle expires.
#[derive(Debug)]
pub struct AssembledTransaction {
    pub instructions: Vec<Instruction>,
    pub initial_lamports: u64,
    pub estimated_final_lamports: u64,
}

pub struct TransactionAssembler {
    raydium: Arc<dyn VenueClient>,
    meteora: Arc<dyn VenueClient>,
    guard: ProfitGuard,
    bot: BotConfig,
    execution: ExecutionConfig,
    relay: RelayConfig,
}

impl TransactionAssembler {
    pub fn new(
        raydium: Arc<dyn VenueClient>,
        meteora: Arc<dyn VenueClient>,
        bot: BotConfig,
        execution: ExecutionConfig,
        relay: RelayConfig,
    ) -> Self {
        let guard = ProfitGuard::new(bot.min_profit_bps, bot.max_price_impact_bps);
        Self {
            raydium,
            meteora,
            guard,
            bot,
            execution,
            relay,
        }
    }

    pub fn guard(&self) -> &ProfitGuard {
        &self.guard
    }

    /// Assemble the full instruction sequence for one execution.
    ///
    /// Fails with `PriceImpactExceeded` before any instruction is built,
    /// and with `InsufficientProfit` after both legs are quoted but
    /// before the tip transfer is appended.
    pub async fn assemble(
        &self,
        execution: &ArbitrageExecution,
        cached: &CachedOpportunity,
        signer: Pubkey,
    ) -> Result<AssembledTransaction, ArbError> {
        let opp = &execution.opportunity;
        let amount_in = execution.amount_in_lamports();

        let (buy_pool, sell_pool, buy_client, sell_client) = if opp.buy_on_meteora {
            (
                &cached.meteora_pool,
                &cached.raydium_pool,
                Arc::clone(&self.meteora),
                Arc::clone(&self.raydium),
            )
        } else {
            (
                &cached.raydium_pool,
                &cached.meteora_pool,
                Arc::clone(&self.raydium),
                Arc::clone(&self.meteora),
            )
        };

        // Impact check runs first: a doomed trade must not get as far as
        // instruction building.
        self.check_price_impact(buy_pool, amount_in)?;

        // Leg 1 quote: SOL -> token on the buy venue. Canonical price is
        // token units per SOL, so the cheap venue is the one quoting more
        // token per SOL.
        let expected_token_out = (amount_in as f64 * buy_pool.price) as u64;
        let min_token_out = apply_slippage(expected_token_out, self.bot.slippage_bps);

        // Leg 2 chains from leg 1's quoted output rather than a fresh
        // independent quote.
        self.check_price_impact_token(sell_pool, expected_token_out)?;
        let estimated_final = (expected_token_out as f64 / sell_pool.price) as u64;
        let min_sol_out = apply_slippage(estimated_final, self.bot.slippage_bps);

        debug!(
            pair = %opp.pair_name,
            amount_in,
            expected_token_out,
            min_token_out,
            estimated_final,
            min_sol_out,
            "leg quotes computed"
        );

        let mut instructions = Vec::new();
        instructions.push(ComputeBudgetInstruction::set_compute_unit_limit(
            self.execution.compute_unit_limit,
        ));
        if self.execution.compute_unit_price > 0 {
            instructions.push(ComputeBudgetInstruction::set_compute_unit_price(
                self.execution.compute_unit_price,
            ));
        }

        let leg1 = buy_client
            .build_swap_instructions(
                &buy_pool.pool_id,
                amount_in,
                min_token_out,
                SwapDirection::SolToToken,
                signer,
                &opp.token_address,
            )
            .await?;
        instructions.extend(leg1);

        let leg2 = sell_client
            .build_swap_instructions(
                &sell_pool.pool_id,
                expected_token_out,
                min_sol_out,
                SwapDirection::TokenToSol,
                signer,
                &opp.token_address,
            )
            .await?;
        instructions.extend(leg2);

        // Profit guard observes the post-leg estimate; only a passing
        // attempt gets the tip transfer appended.
        debug!(
            phase = %AttemptPhase::Guarding,
            amount_in,
            estimated_final,
            "evaluating profit guard"
        );
        self.guard
            .check_profit(lamports_to_sol(amount_in), lamports_to_sol(estimated_final))?;

        instructions.push(system_instruction::transfer(
            &signer,
            &self.relay.tip_account,
            self.relay.tip_lamports,
        ));

        info!(
            pair = %opp.pair_name,
            direction = opp.direction_label(),
            instructions = instructions.len(),
            amount_in,
            estimated_final,
            "arbitrage transaction assembled"
        );

        Ok(AssembledTransaction {
            instructions,
            initial_lamports: amount_in,
            estimated_final_lamports: estimated_final,
        })
    }

    fn check_price_impact(&self, pool: &PoolSnapshot, amount_in: u64) -> Result<(), ArbError> {
        match pool.reserve_sol {
            Some(reserve) if reserve > 0 => {
                let impact_bps = constant_product_impact_bps(amount_in, reserve);
                self.guard.check_price_impact(&pool.pool_id, impact_bps)
            }
            _ => {
                // Pair APIs do not always expose reserves; without them
                // the ceiling cannot be verified for this leg.
                debug!(pool = %pool.pool_id, "no reserve data, price impact unverified");
                Ok(())
            }
        }
    }

    fn check_price_impact_token(
        &self,
        pool: &PoolSnapshot,
        token_amount_in: u64,
    ) -> Result<(), ArbError> {
        match pool.reserve_token {
            Some(reserve) if reserve > 0 => {
                let impact_bps = constant_product_impact_bps(token_amount_in, reserve);
                self.guard.check_price_impact(&pool.pool_id, impact_bps)
            }
            _ => {
                debug!(pool = %pool.pool_id, "no reserve data, price impact unverified");
                Ok(())
            }
        }
    }
}

/// Slippage-adjusted floor: `expected * (1 - slippage/10_000)`
fn apply_slippage(expected_amount: u64, slippage_bps: u64) -> u64 {
    let multiplier = 10_000u128 - slippage_bps as u128;
    (expected_amount as u128 * multiplier / 10_000) as u64
}

/// Constant-product price impact of trading `amount_in` against a pool
/// holding `reserve_in` of the input asset, in basis points.
fn constant_product_impact_bps(amount_in: u64, reserve_in: u64) -> u64 {
    // Impact ~ amount / (reserve + amount) for x*y=k
    let amount = amount_in as f64;
    let reserve = reserve_in as f64;
    (amount / (reserve + amount) * 10_000.0) as u64
}

fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / 1e9
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbitrage::ArbitrageOpportunity;
    use crate::venue::{VenueId, WSOL_MINT};
    use async_trait::async_trait;
    use solana_sdk::compute_budget;

    const TOKEN: &str = "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263";

    /// Venue stub emitting one marker instruction per leg
    struct StubVenue {
        venue: VenueId,
        marker: u8,
    }

    #[async_trait]
    impl VenueClient for StubVenue {
        fn venue(&self) -> VenueId {
            self.venue
        }

        async fn fetch_sol_pools(&self) -> Result<Vec<PoolSnapshot>, ArbError> {
            Ok(Vec::new())
        }

        async fn build_swap_instructions(
            &self,
            _pool_id: &str,
            amount_in: u64,
            minimum_out: u64,
            _direction: SwapDirection,
            signer: Pubkey,
            _token_mint: &str,
        ) -> Result<Vec<Instruction>, ArbError> {
            let mut data = vec![self.marker];
            data.extend_from_slice(&amount_in.to_le_bytes());
            data.extend_from_slice(&minimum_out.to_le_bytes());
            Ok(vec![Instruction {
                program_id: Pubkey::new_unique(),
                accounts: vec![solana_sdk::instruction::AccountMeta::new(signer, true)],
                data,
            }])
        }
    }

    fn pool(venue: VenueId, pool_id: &str, price: f64) -> PoolSnapshot {
        PoolSnapshot {
            venue,
            pool_id: pool_id.to_string(),
            name: "WSOL/BONK".to_string(),
            token_a: WSOL_MINT.to_string(),
            token_b: TOKEN.to_string(),
            price,
            liquidity: 8000.0,
            is_sol_base: true,
            reserve_sol: None,
            reserve_token: None,
        }
    }

    fn cached(ray_price: f64, met_price: f64) -> CachedOpportunity {
        // Cheap venue = more token per SOL; buy there
        let buy_on_meteora = met_price > ray_price;
        let spread =
            (ray_price - met_price).abs() / ray_price.min(met_price) * 100.0;
        CachedOpportunity {
            opportunity: ArbitrageOpportunity {
                pair_name: "WSOL/BONK".to_string(),
                raydium_pool_id: "ray-pool".to_string(),
                meteora_pool_id: "met-pool".to_string(),
                token_address: TOKEN.to_string(),
                expected_profit_pct: spread,
                buy_on_meteora,
            },
            raydium_pool: pool(VenueId::Raydium, "ray-pool", ray_price),
            meteora_pool: pool(VenueId::Meteora, "met-pool", met_price),
        }
    }

    fn assembler(min_profit_bps: u64, max_impact_bps: u64) -> TransactionAssembler {
        TransactionAssembler::new(
            Arc::new(StubVenue {
                venue: VenueId::Raydium,
                marker: 0xAA,
            }),
            Arc::new(StubVenue {
                venue: VenueId::Meteora,
                marker: 0xBB,
            }),
            BotConfig {
                min_profit_bps,
                max_price_impact_bps: max_impact_bps,
                slippage_bps: 100,
            },
            ExecutionConfig {
                compute_unit_limit: 1_400_000,
                compute_unit_price: 0,
            },
            RelayConfig {
                url: "http://localhost".to_string(),
                api_key: "test".to_string(),
                tip_account: Pubkey::new_unique(),
                tip_lamports: 1_000_000,
                front_running_protection: false,
                submit_timeout_ms: 10_000,
            },
        )
    }

    #[tokio::test]
    async fn test_instruction_order() {
        let asm = assembler(50, 100);
        // Meteora quotes 102 token/SOL vs Raydium 100: buy on Meteora
        let cached = cached(100.0, 102.0);
        let exec = ArbitrageExecution::new(cached.opportunity.clone(), 1.0);

        let tx = asm
            .assemble(&exec, &cached, Pubkey::new_unique())
            .await
            .unwrap();

        // [compute-budget, leg1, leg2, tip]
        assert_eq!(tx.instructions.len(), 4);
        assert_eq!(tx.instructions[0].program_id, compute_budget::id());
        assert_eq!(tx.instructions[1].data[0], 0xBB); // buy leg on meteora
        assert_eq!(tx.instructions[2].data[0], 0xAA); // sell leg on raydium
        assert_eq!(
            tx.instructions[3].program_id,
            solana_sdk::system_program::id()
        );
    }

    #[tokio::test]
    async fn test_priority_fee_instruction_when_configured() {
        let mut asm = assembler(50, 100);
        asm.execution.compute_unit_price = 1000;
        let cached = cached(100.0, 102.0);
        let exec = ArbitrageExecution::new(cached.opportunity.clone(), 1.0);

        let tx = asm
            .assemble(&exec, &cached, Pubkey::new_unique())
            .await
            .unwrap();
        assert_eq!(tx.instructions.len(), 5);
        assert_eq!(tx.instructions[1].program_id, compute_budget::id());
    }

    #[tokio::test]
    async fn test_leg2_chains_from_leg1_output() {
        let asm = assembler(50, 100);
        let cached = cached(100.0, 102.0);
        let exec = ArbitrageExecution::new(cached.opportunity.clone(), 1.0);
        let tx = asm
            .assemble(&exec, &cached, Pubkey::new_unique())
            .await
            .unwrap();

        // Buy leg: 1 SOL * 102 token/SOL
        let leg1_in = u64::from_le_bytes(tx.instructions[1].data[1..9].try_into().unwrap());
        assert_eq!(leg1_in, 1_000_000_000);
        let expected_token_out = (1_000_000_000f64 * 102.0) as u64;

        // Sell leg input is leg 1's quoted output, not a fresh estimate
        let leg2_in = u64::from_le_bytes(tx.instructions[2].data[1..9].try_into().unwrap());
        assert_eq!(leg2_in, expected_token_out);

        // 102/100 spread nets ~2% on the initial amount
        assert!(tx.estimated_final_lamports > tx.initial_lamports);
    }

    #[tokio::test]
    async fn test_insufficient_profit_aborts_before_tip() {
        // 0.3% spread against a 50 bps minimum: guard must abort
        let asm = assembler(50, 100);
        let cached = cached(100.0, 100.3);
        let exec = ArbitrageExecution::new(cached.opportunity.clone(), 1.0);

        let err = asm
            .assemble(&exec, &cached, Pubkey::new_unique())
            .await
            .unwrap_err();
        assert!(matches!(err, ArbError::InsufficientProfit { .. }));
    }

    #[tokio::test]
    async fn test_price_impact_aborts_before_instructions() {
        let asm = assembler(50, 100);
        let mut cached = cached(100.0, 102.0);
        // 1 SOL against a 10-SOL reserve: ~909 bps impact, over a 100 bps ceiling
        cached.meteora_pool.reserve_sol = Some(10_000_000_000);
        let exec = ArbitrageExecution::new(cached.opportunity.clone(), 1.0);

        let err = asm
            .assemble(&exec, &cached, Pubkey::new_unique())
            .await
            .unwrap_err();
        assert!(matches!(err, ArbError::PriceImpactExceeded { .. }));
    }

    #[test]
    fn test_apply_slippage() {
        assert_eq!(apply_slippage(1_000_000, 100), 990_000);
        assert_eq!(apply_slippage(1_000_000, 50), 995_000);
        assert_eq!(apply_slippage(1_000_000, 0), 1_000_000);
    }

    #[test]
    fn test_constant_product_impact() {
        // Trading 1 against 99 in reserve: 1% of the post-trade pool
        assert_eq!(constant_product_impact_bps(1_000, 99_000), 100);
        // Tiny trade, negligible impact
        assert_eq!(constant_product_impact_bps(1, 1_000_000_000), 0);
    }
}
