// Venue adapters for the two AMM venues the engine trades across.
//
// Each venue exposes the same narrow capability set behind `VenueClient`:
// fetching normalized SOL-pool snapshots from its pair API, and building
// the swap instructions for one leg of an arbitrage transaction.

pub mod meteora;
pub mod raydium;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use solana_sdk::{instruction::Instruction, pubkey::Pubkey};

use crate::error::ArbError;

pub use meteora::MeteoraClient;
pub use raydium::RaydiumClient;

/// Wrapped SOL mint, the base asset of every pair the engine considers
pub const WSOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// Venue identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VenueId {
    Raydium,
    Meteora,
}

impl VenueId {
    pub fn as_str(&self) -> &'static str {
        match self {
            VenueId::Raydium => "raydium",
            VenueId::Meteora => "meteora",
        }
    }
}

impl std::fmt::Display for VenueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a single swap leg relative to the base asset
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwapDirection {
    /// SOL in, token out (buy leg)
    SolToToken,
    /// Token in, SOL out (sell leg)
    TokenToSol,
}

/// Normalized snapshot of one SOL pool as reported by a venue pair API.
///
/// Immutable once fetched; superseded wholesale by the next refresh cycle.
/// `price` is always canonical: token units per one SOL.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub venue: VenueId,
    pub pool_id: String,
    /// Pair name normalized to `WSOL/<TOKEN>`
    pub name: String,
    pub token_a: String,
    pub token_b: String,
    /// Canonical price: token units per one SOL
    pub price: f64,
    /// USD-denominated liquidity
    pub liquidity: f64,
    /// Whether SOL was the first member of the raw pair
    pub is_sol_base: bool,
    /// SOL-side reserve in lamports, when the pair API exposes it
    #[serde(default)]
    pub reserve_sol: Option<u64>,
    /// Token-side reserve in base units, when the pair API exposes it
    #[serde(default)]
    pub reserve_token: Option<u64>,
}

impl PoolSnapshot {
    /// Mint address of the non-SOL side of the pair
    pub fn non_sol_token(&self) -> &str {
        if self.token_a == WSOL_MINT {
            &self.token_b
        } else {
            &self.token_a
        }
    }
}

/// Capability set shared by every venue adapter
#[async_trait]
pub trait VenueClient: Send + Sync {
    fn venue(&self) -> VenueId;

    /// Fetch all SOL pools above the configured liquidity floor, with
    /// prices already normalized to token-per-SOL.
    async fn fetch_sol_pools(&self) -> Result<Vec<PoolSnapshot>, ArbError>;

    /// Build the ordered swap instructions for one leg. `minimum_out` is
    /// the slippage-adjusted floor computed by the assembler from the
    /// quoted output.
    async fn build_swap_instructions(
        &self,
        pool_id: &str,
        amount_in: u64,
        minimum_out: u64,
        direction: SwapDirection,
        signer: Pubkey,
        token_mint: &str,
    ) -> Result<Vec<Instruction>, ArbError>;
}

/// Normalize a raw pair name to the canonical `WSOL/<TOKEN>` form.
///
/// `separator` is venue specific ('/' for Raydium, '-' for Meteora).
pub(crate) fn normalize_pair_name(name: &str, separator: char, sol_is_first: bool) -> String {
    let mut parts = name.splitn(2, separator);
    let first = parts.next().unwrap_or(name);
    let second = parts.next().unwrap_or("");
    if sol_is_first {
        format!("WSOL/{}", second)
    } else {
        format!("WSOL/{}", first)
    }
}
