// Detection and execution pipeline.
//
// One detection cycle fetches both venues concurrently (cache-first, with
// stale fallback when a provider is down), matches and ranks the result,
// and persists the ranked set in memory and on disk. Execution replays a
// cached opportunity through the assembler and hands the result to the
// relay submitter, logging each phase transition.

use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::signature::Keypair;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::arbitrage::{rank_opportunities, ArbitrageExecution, OpportunityMatcher};
use crate::cache::{CacheStore, CachedOpportunity, Clock, SnapshotCache, TopNCache};
use crate::chain::{AttemptPhase, RelaySubmitter, TransactionAssembler};
use crate::config::Config;
use crate::error::ArbError;
use crate::venue::{PoolSnapshot, VenueClient};

pub struct ArbEngine {
    raydium: Arc<dyn VenueClient>,
    meteora: Arc<dyn VenueClient>,
    matcher: OpportunityMatcher,
    snapshots: SnapshotCache,
    top: TopNCache,
    store: CacheStore,
    assembler: TransactionAssembler,
    submitter: RelaySubmitter,
    top_n: usize,
    top_ttl_ms: u64,
    clock: Arc<dyn Clock>,
}

impl ArbEngine {
    pub fn new(
        config: &Config,
        raydium: Arc<dyn VenueClient>,
        meteora: Arc<dyn VenueClient>,
        rpc: Arc<RpcClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let assembler = TransactionAssembler::new(
            Arc::clone(&raydium),
            Arc::clone(&meteora),
            config.bot.clone(),
            config.execution.clone(),
            config.relay.clone(),
        );
        let submitter = RelaySubmitter::new(rpc, config.relay.clone(), config.rpc.timeout_ms);

        Self {
            raydium,
            meteora,
            matcher: OpportunityMatcher::new(config.matcher.clone()),
            snapshots: SnapshotCache::new(config.cache.pool_ttl_ms, Arc::clone(&clock)),
            top: TopNCache::new(config.cache.top_ttl_ms, Arc::clone(&clock)),
            store: CacheStore::new(&config.cache.cache_dir, Arc::clone(&clock)),
            assembler,
            submitter,
            top_n: config.cache.top_n,
            top_ttl_ms: config.cache.top_ttl_ms,
            clock,
        }
    }

    /// Snapshot set for one venue: fresh cache, else a live fetch, else
    /// the last stale set when the provider is unreachable.
    async fn venue_snapshots(
        &self,
        client: &Arc<dyn VenueClient>,
    ) -> Result<Vec<PoolSnapshot>, ArbError> {
        let venue = client.venue();
        if let Some(pools) = self.snapshots.get_fresh(venue) {
            info!(venue = %venue, pools = pools.len(), "using fresh cached snapshots");
            return Ok(pools);
        }

        match client.fetch_sol_pools().await {
            Ok(pools) => {
                self.snapshots.put(venue, pools.clone());
                if let Err(e) = self.store.save_pools(venue, &pools).await {
                    warn!(venue = %venue, error = %e, "failed to persist pool cache");
                }
                Ok(pools)
            }
            Err(e) if e.is_retryable() => {
                if let Some(pools) = self.snapshots.get_fallback(venue) {
                    return Ok(pools);
                }
                // Last resort after a restart: the on-disk snapshot file
                match self.store.load_pools(venue).await {
                    Ok(Some(file)) => {
                        let age_ms = self.clock.now_millis() - file.timestamp;
                        warn!(
                            venue = %venue,
                            age_ms,
                            pools = file.pools.len(),
                            "provider unavailable, using on-disk snapshot cache"
                        );
                        Ok(file.pools)
                    }
                    _ => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Run one full detection cycle and return the ranked top-N set.
    pub async fn detect(&self) -> Result<Vec<CachedOpportunity>, ArbError> {
        let (raydium_pools, meteora_pools) = tokio::join!(
            self.venue_snapshots(&self.raydium),
            self.venue_snapshots(&self.meteora),
        );
        let raydium_pools = raydium_pools?;
        let meteora_pools = meteora_pools?;

        let opportunities = self
            .matcher
            .match_snapshots(&raydium_pools, &meteora_pools);
        let ranked = rank_opportunities(opportunities, self.top_n);

        let ray_by_id: HashMap<&str, &PoolSnapshot> = raydium_pools
            .iter()
            .map(|p| (p.pool_id.as_str(), p))
            .collect();
        let met_by_id: HashMap<&str, &PoolSnapshot> = meteora_pools
            .iter()
            .map(|p| (p.pool_id.as_str(), p))
            .collect();

        let cached: Vec<CachedOpportunity> = ranked
            .into_iter()
            .filter_map(|opportunity| {
                let raydium_pool = ray_by_id.get(opportunity.raydium_pool_id.as_str())?;
                let meteora_pool = met_by_id.get(opportunity.meteora_pool_id.as_str())?;
                Some(CachedOpportunity {
                    opportunity,
                    raydium_pool: (*raydium_pool).clone(),
                    meteora_pool: (*meteora_pool).clone(),
                })
            })
            .collect();

        self.top.put(cached.clone());
        if let Err(e) = self.store.save_top(&cached).await {
            warn!(error = %e, "failed to persist top opportunity cache");
        }

        info!(opportunities = cached.len(), "detection cycle complete");
        Ok(cached)
    }

    /// Ranked set from the last detection cycle, if still within TTL
    pub fn cached_top(&self) -> Option<Vec<CachedOpportunity>> {
        self.top.get()
    }

    /// Execute one opportunity end to end: assemble, guard, finalize,
    /// submit. Returns the relay-reported signature.
    pub async fn execute(
        &self,
        execution: &ArbitrageExecution,
        signer: &Keypair,
    ) -> Result<String, ArbError> {
        let opp = &execution.opportunity;

        // The cached entry must still be live; executing against pools
        // the last ranking pass never saw is a fatal input error.
        let cached = match self.top.find_by_pool_id(&opp.raydium_pool_id) {
            Some(cached) => cached,
            None => self
                .disk_top_lookup(&opp.raydium_pool_id)
                .await
                .ok_or_else(|| ArbError::PoolNotFound {
                    pool_id: opp.raydium_pool_id.clone(),
                })?,
        };

        info!(
            pair = %opp.pair_name,
            direction = opp.direction_label(),
            expected_profit_bps = opp.expected_profit_bps(),
            amount_sol = execution.amount_in_sol,
            phase = %AttemptPhase::Assembling,
            "execution attempt started"
        );

        let result = self.run_attempt(execution, &cached, signer).await;
        match &result {
            Ok(signature) => {
                info!(%signature, phase = %AttemptPhase::Confirmed, "execution attempt finished");
            }
            Err(e) => {
                let terminal = AttemptPhase::from_failure(e);
                debug_assert!(terminal.is_terminal());
                error!(error = %e, phase = %terminal, "execution attempt failed");
            }
        }
        result
    }

    /// Replay an opportunity from the on-disk top cache, honoring the
    /// same TTL as the in-memory copy.
    async fn disk_top_lookup(&self, pool_id: &str) -> Option<CachedOpportunity> {
        let file = self.store.load_top().await.ok().flatten()?;
        let age_ms = self.clock.now_millis() - file.timestamp;
        if age_ms >= self.top_ttl_ms as i64 {
            warn!(age_ms, "on-disk top cache expired, refusing replay");
            return None;
        }
        file.opportunities.into_iter().find(|entry| {
            entry.opportunity.raydium_pool_id == pool_id
                || entry.opportunity.meteora_pool_id == pool_id
        })
    }

    async fn run_attempt(
        &self,
        execution: &ArbitrageExecution,
        cached: &CachedOpportunity,
        signer: &Keypair,
    ) -> Result<String, ArbError> {
        use solana_sdk::signer::Signer;

        let assembled = self
            .assembler
            .assemble(execution, cached, signer.pubkey())
            .await?;

        info!(
            initial_lamports = assembled.initial_lamports,
            estimated_final_lamports = assembled.estimated_final_lamports,
            "handing assembled transaction to the relay submitter"
        );
        self.submitter.finalize_and_submit(&assembled, signer).await
    }
}
