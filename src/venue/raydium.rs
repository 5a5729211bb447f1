// Raydium venue adapter.
//
// Snapshots come from the public pairs API; swap instructions target the
// Raydium AMM v4 program directly (discriminator 9, amount_in,
// minimum_out) against the signer's associated token accounts.

use async_trait::async_trait;
use serde::Deserialize;
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

const RAYDIUM_PAIRS_URL: &str = "https://api.raydium.io/v2/main/pairs";
const RAYDIUM_AMM_V4: &str = "675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8";

/// Raw pair record as returned by the Raydium pairs API
#[derive(Debug, Deserialize)]
struct RaydiumPairRaw {
    #[serde(rename = "ammId")]
    amm_id: String,
    name: String,
    #[serde(rename = "baseMint")]
    base_mint: String,
    #[serde(rename = "quoteMint")]
    quote_mint: String,
    price: Option<f64>,
    liquidity: Option<f64>,
}

pub struct RaydiumClient {
    http: reqwest::Client,
    pairs_url: String,
    liquidity_floor_usd: f64,
    timeout_ms: u64,
    retry: RetryPolicy,
}

impl RaydiumClient {
    pub fn new(timeout_ms: u64, liquidity_floor_usd: f64) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_millis(timeout_ms))
                .build()
                .expect("reqwest client"),
            pairs_url: RAYDIUM_PAIRS_URL.to_string(),
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

    async fn fetch_pairs(&self) -> Result<Vec<RaydiumPairRaw>, ArbError> {
        let url = self.pairs_url.clone();
        self.retry
            .retry_async(|| async {
                let response = self.http.get(&url).send().await.map_err(|e| {
                    if e.is_timeout() {
                        ArbError::NetworkTimeout {
                            operation: "raydium pairs fetch",
                            timeout_ms: self.timeout_ms,
                        }
                    } else {
                        ArbError::ProviderUnavailable {
                            venue: "raydium",
                            source: e.into(),
                        }
                    }
                })?;
                response
                    .json::<Vec<RaydiumPairRaw>>()
                    .await
                    .map_err(|e| ArbError::ProviderUnavailable {
                        venue: "raydium",
                        source: e.into(),
                    })
            })
            .await
    }

    fn to_snapshot(&self, raw: &RaydiumPairRaw) -> Option<PoolSnapshot> {
        let contains_sol = raw.base_mint == WSOL_MINT || raw.quote_mint == WSOL_MINT;
        let liquidity = raw.liquidity.unwrap_or(0.0);
        if !contains_sol || liquidity <= self.liquidity_floor_usd {
            return None;
        }

        let is_sol_base = raw.base_mint == WSOL_MINT;
        let price = match normalize_price(raw.price?, !is_sol_base, "raydium") {
            Ok(p) => p,
            Err(e) => {
                warn!(pool = %raw.amm_id, pair = %raw.name, %e, "skipping pool with invalid quote");
                return None;
            }
        };

        Some(PoolSnapshot {
            venue: VenueId::Raydium,
            pool_id: raw.amm_id.clone(),
            name: normalize_pair_name(&raw.name, '/', is_sol_base),
            token_a: raw.base_mint.clone(),
            token_b: raw.quote_mint.clone(),
            price,
            liquidity,
            is_sol_base,
            reserve_sol: None,
            reserve_token: None,
        })
    }
}

#[async_trait]
impl VenueClient for RaydiumClient {
    fn venue(&self) -> VenueId {
        VenueId::Raydium
    }

    async fn fetch_sol_pools(&self) -> Result<Vec<PoolSnapshot>, ArbError> {
        let pairs = self.fetch_pairs().await?;
        debug!(total = pairs.len(), "raydium pairs fetched");

        let pools: Vec<PoolSnapshot> = pairs
            .iter()
            .filter_map(|raw| self.to_snapshot(raw))
            .collect();

        info!(sol_pools = pools.len(), "raydium SOL pools normalized");
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

        let program_id = Pubkey::from_str(RAYDIUM_AMM_V4).expect("static program id");

        let accounts = vec![
            AccountMeta::new_readonly(spl_token::id(), false),
            AccountMeta::new(pool, false),
            AccountMeta::new_readonly(signer, true),
            AccountMeta::new(user_source, false),
            AccountMeta::new(user_destination, false),
        ];

        // AMM v4 swap: discriminator 9, fixed-side-in
        let mut data = vec![9u8];
        data.extend_from_slice(&amount_in.to_le_bytes());
        data.extend_from_slice(&minimum_out.to_le_bytes());

        debug!(
            pool = pool_id,
            amount_in,
            minimum_out,
            ?direction,
            "built raydium swap instruction"
        );

        Ok(vec![Instruction {
            program_id,
            accounts,
            data,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(base: &str, quote: &str, price: Option<f64>, liquidity: Option<f64>) -> RaydiumPairRaw {
        RaydiumPairRaw {
            amm_id: "AmmId111111111111111111111111111111111111111".to_string(),
            name: "SOL/USDC".to_string(),
            base_mint: base.to_string(),
            quote_mint: quote.to_string(),
            price,
            liquidity,
        }
    }

    const USDC: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

    #[test]
    fn test_snapshot_normalizes_sol_base() {
        let client = RaydiumClient::new(5_000, 5000.0);
        let snap = client
            .to_snapshot(&raw(WSOL_MINT, USDC, Some(150.0), Some(10_000.0)))
            .unwrap();
        assert_eq!(snap.price, 150.0);
        assert!(snap.is_sol_base);
        assert_eq!(snap.name, "WSOL/USDC");
    }

    #[test]
    fn test_snapshot_inverts_when_sol_is_quote() {
        let client = RaydiumClient::new(5_000, 5000.0);
        let snap = client
            .to_snapshot(&raw(USDC, WSOL_MINT, Some(0.00004), Some(10_000.0)))
            .unwrap();
        assert!((snap.price - 25_000.0).abs() < 1e-6);
        assert!(!snap.is_sol_base);
    }

    #[test]
    fn test_snapshot_filters() {
        let client = RaydiumClient::new(5_000, 5000.0);
        // No SOL side
        assert!(client
            .to_snapshot(&raw(USDC, USDC, Some(1.0), Some(10_000.0)))
            .is_none());
        // Liquidity at/below floor
        assert!(client
            .to_snapshot(&raw(WSOL_MINT, USDC, Some(150.0), Some(4_000.0)))
            .is_none());
        // Missing or zero price never passes through
        assert!(client
            .to_snapshot(&raw(WSOL_MINT, USDC, None, Some(10_000.0)))
            .is_none());
        assert!(client
            .to_snapshot(&raw(WSOL_MINT, USDC, Some(0.0), Some(10_000.0)))
            .is_none());
    }

    #[tokio::test]
    async fn test_swap_instruction_shape() {
        let client = RaydiumClient::new(5_000, 5000.0);
        let signer = Pubkey::new_unique();
        let ixs = client
            .build_swap_instructions(
                "Ammid11111111111111111111111111111111111111",
                1_000_000,
                990_000,
                SwapDirection::SolToToken,
                signer,
                USDC,
            )
            .await
            .unwrap();

        assert_eq!(ixs.len(), 1);
        let ix = &ixs[0];
        assert_eq!(ix.program_id.to_string(), RAYDIUM_AMM_V4);
        assert_eq!(ix.data[0], 9);
        assert_eq!(&ix.data[1..9], &1_000_000u64.to_le_bytes());
        assert_eq!(&ix.data[9..17], &990_000u64.to_le_bytes());
    }

    fn quick_retry() -> RetryPolicy {
        RetryPolicy {
            initial_interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(5),
            multiplier: 1.0,
            max_elapsed: Duration::from_millis(20),
        }
    }

    #[tokio::test]
    async fn test_fetch_sol_pools_from_pairs_api() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!([
            {
                "ammId": "AmmId111111111111111111111111111111111111111",
                "name": "SOL/USDC",
                "baseMint": WSOL_MINT,
                "quoteMint": USDC,
                "price": 150.0,
                "liquidity": 10_000.0
            },
            {
                "ammId": "AmmId222222222222222222222222222222222222222",
                "name": "USDC/USDT",
                "baseMint": USDC,
                "quoteMint": USDC,
                "price": 1.0,
                "liquidity": 10_000.0
            }
        ])
        .to_string();
        let mock = server
            .mock("GET", "/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;

        let client = RaydiumClient::new(1_000, 5000.0).with_pairs_url(server.url());
        let pools = client.fetch_sol_pools().await.unwrap();

        // Only the SOL pair survives normalization
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].name, "WSOL/USDC");
        assert_eq!(pools[0].price, 150.0);
        assert_eq!(pools[0].non_sol_token(), USDC);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_malformed_pairs_body_is_provider_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let client = RaydiumClient::new(1_000, 5000.0)
            .with_pairs_url(server.url())
            .with_retry_policy(quick_retry());
        let err = client.fetch_sol_pools().await.unwrap_err();
        assert!(matches!(
            err,
            ArbError::ProviderUnavailable { venue: "raydium", .. }
        ));
    }

    #[tokio::test]
    async fn test_slow_pairs_api_is_network_timeout() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/")
            .with_body_from_request(|_| {
                std::thread::sleep(Duration::from_millis(200));
                b"[]".to_vec()
            })
            .create_async()
            .await;

        let client = RaydiumClient::new(50, 5000.0)
            .with_pairs_url(server.url())
            .with_retry_policy(quick_retry());
        let err = client.fetch_sol_pools().await.unwrap_err();
        match err {
            ArbError::NetworkTimeout { timeout_ms, .. } => assert_eq!(timeout_ms, 50),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_pool_id_is_pool_not_found() {
        let client = RaydiumClient::new(5_000, 5000.0);
        let err = client
            .build_swap_instructions(
                "not-a-pubkey",
                1,
                1,
                SwapDirection::SolToToken,
                Pubkey::new_unique(),
                USDC,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ArbError::PoolNotFound { .. }));
    }
}
