// Meteora venue adapter.
//
// Snapshots come from the DLMM pair API. The API quotes `current_price`
// and `liquidity` as either JSON numbers or strings depending on the
// endpoint revision, so both are accepted at the boundary.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{normalize_pair_name, PoolSnapshot, SwapDirection, VenueClient, VenueId, WSOL_MINT};
use crate::arbitrage::price::normalize_price;
use crate::error::ArbError;
use crate::retry::RetryPolicy;

const METEORA_PAIRS_URL: &str = "https://dlmm-api.meteora.ag/pair/all";
const METEORA_DLMM: &str = "LBUZKhRxPF3XUpBCjp4YzTKgLccjZhTSDM9YuVaPwxo";

fn f64_from_string_or_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(f64),
        Str(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

/// Raw pair record as returned by the Meteora DLMM pair API
#[derive(Debug, Deserialize)]
struct MeteoraPairRaw {
    address: String,
    name: String,
    mint_x: String,
    mint_y: String,
    #[serde(deserialize_with = "f64_from_string_or_number")]
    current_price: f64,
    #[serde(deserialize_with = "f64_from_string_or_number")]
    liquidity: f64,
}

pub struct MeteoraClient {
    http: reqwest::Client,
    pairs_url: String,
    liquidity_floor_usd: f64,
    timeout_ms: u64,
    retry: RetryPolicy,
}

impl MeteoraClient {
    pub fn new(timeout_ms: u64, liquidity_floor_usd: f64) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_millis(timeout_ms))
                .build()
                .expect("reqwest client"),
            pairs_url: METEORA_PAIRS_URL.to_string(),
            liquidity_floor_usd,
            timeout_ms,
            retry: RetryPolicy::default(),
        }
    }

    /// Point the adapter at a different pairs endpoint (tests)
    pub fn with_pairs_url(mut self, url: impl Into<String>) -> Self {
        self.pairs_url = url.into();
        self
    }

    /// Override the retry schedule (tests use a near-zero one)
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch_pairs(&self) -> Result<Vec<MeteoraPairRaw>, ArbError> {
        let url = self.pairs_url.clone();
        self.retry
            .retry_async(|| async {
                let response = self.http.get(&url).send().await.map_err(|e| {
                    if e.is_timeout() {
                        ArbError::NetworkTimeout {
                            operation: "meteora pairs fetch",
                            timeout_ms: self.timeout_ms,
                        }
                    } else {
                        ArbError::ProviderUnavailable {
                            venue: "meteora",
                            source: e.into(),
                        }
                    }
                })?;
                response
                    .json::<Vec<MeteoraPairRaw>>()
                    .await
                    .map_err(|e| ArbError::ProviderUnavailable {
                        venue: "meteora",
                        source: e.into(),
                    })
            })
            .await
    }

    fn to_snapshot(&self, raw: &MeteoraPairRaw) -> Option<PoolSnapshot> {
        let contains_sol = raw.mint_x == WSOL_MINT || raw.mint_y == WSOL_MINT;
        if !contains_sol || raw.liquidity < self.liquidity_floor_usd {
            return None;
        }

        // SOL side resolved from the mint, never from the pair name: two
        // listings can share a symbol without sharing a mint.
        let is_sol_first = raw.mint_x == WSOL_MINT;
        let price = match normalize_price(raw.current_price, !is_sol_first, "meteora") {
            Ok(p) => p,
            Err(e) => {
                warn!(pool = %raw.address, pair = %raw.name, %e, "skipping pool with invalid quote");
                return None;
            }
        };

        Some(PoolSnapshot {
            venue: VenueId::Meteora,
            pool_id: raw.address.clone(),
            name: normalize_pair_name(&raw.name, '-', is_sol_first),
            token_a: raw.mint_x.clone(),
            token_b: raw.mint_y.clone(),
            price,
            liquidity: raw.liquidity,
            is_sol_base: is_sol_first,
            reserve_sol: None,
            reserve_token: None,
        })
    }
}

#[async_trait]
impl VenueClient for MeteoraClient {
    fn venue(&self) -> VenueId {
        VenueId::Meteora
    }

    async fn fetch_sol_pools(&self) -> Result<Vec<PoolSnapshot>, ArbError> {
        let pairs = self.fetch_pairs().await?;
        debug!(total = pairs.len(), "meteora pairs fetched");

        let pools: Vec<PoolSnapshot> = pairs
            .iter()
            .filter_map(|raw| self.to_snapshot(raw))
            .collect();

        info!(sol_pools = pools.len(), "meteora SOL pools normalized");
        Ok(pools)
    }

    async fn build_swap_instructions(
        &self,
        pool_id: &str,
        amount_in: u64,
        minimum_out: u64,
        direction: SwapDirection,
        signer: Pubkey,
        token_mint: &str,
    ) -> Result<Vec<Instruction>, ArbError> {
        let pool = Pubkey::from_str(pool_id).map_err(|_| ArbError::PoolNotFound {
            pool_id: pool_id.to_string(),
        })?;
        let token = Pubkey::from_str(token_mint).map_err(|_| ArbError::QuoteUnavailable {
            pool_id: pool_id.to_string(),
            reason: format!("invalid token mint {}", token_mint),
        })?;
        let wsol = Pubkey::from_str(WSOL_MINT).expect("static mint");

        let (source_mint, destination_mint) = match direction {
            SwapDirection::SolToToken => (wsol, token),
            SwapDirection::TokenToSol => (token, wsol),
        };
        let user_source =
            spl_associated_token_account::get_associated_token_address(&signer, &source_mint);
        let user_destination =
            spl_associated_token_account::get_associated_token_address(&signer, &destination_mint);

        let program_id = Pubkey::from_str(METEORA_DLMM).expect("static program id");

        let accounts = vec![
            AccountMeta::new(pool, false),
            AccountMeta::new_readonly(signer, true),
            AccountMeta::new(user_source, false),
            AccountMeta::new(user_destination, false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ];

        // DLMM swap discriminator + amount_in + min_amount_out
        let mut data = vec![0xf8, 0x3d, 0x2a, 0x3b, 0x88, 0x1b, 0x0e, 0x94];
        data.extend_from_slice(&amount_in.to_le_bytes());
        data.extend_from_slice(&minimum_out.to_le_bytes());

        debug!(
            pool = pool_id,
            amount_in,
            minimum_out,
            ?direction,
            "built meteora swap instruction"
        );

        Ok(vec![Instruction {
            program_id,
            accounts,
            data,
        }])
    }
}
