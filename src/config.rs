use anyhow::{Context, Result};
use solana_sdk::pubkey::Pubkey;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ArbError;

/// Main configuration struct containing all engine settings
#[derive(Debug, Clone)]
pub struct Config {
    pub bot: BotConfig,
    pub matcher: MatcherConfig,
    pub cache: CacheConfig,
    pub rpc: RpcConfig,
    pub relay: RelayConfig,
    pub wallet: WalletConfig,
    pub execution: ExecutionConfig,
}

/// Profit and slippage guards (all in basis points)
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub min_profit_bps: u64,
    pub max_price_impact_bps: u64,
    pub slippage_bps: u64,
}

/// Opportunity matching thresholds
#[derive(Debug, Clone)]
pub struct MatcherConfig {
    /// Minimum absolute spread (percent) to consider a pair
    pub min_spread_pct: f64,
    /// Maximum absolute spread (percent); beyond this one quote is stale
    pub max_spread_pct: f64,
    /// USD liquidity floor applied to both legs at match time
    pub min_liquidity_usd: f64,
    /// USD liquidity floor applied at fetch time, before matching
    pub fetch_liquidity_floor_usd: f64,
}

/// Cache TTLs and sizing. Pool snapshots and the ranked top-N list use
/// independent TTLs.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub pool_ttl_ms: u64,
    pub top_ttl_ms: u64,
    pub top_n: usize,
    pub cache_dir: PathBuf,
}

/// RPC endpoint configuration
#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub url: String,
    pub timeout_ms: u64,
}

/// Relay submission endpoint configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub url: String,
    pub api_key: String,
    pub tip_account: Pubkey,
    pub tip_lamports: u64,
    pub front_running_protection: bool,
    pub submit_timeout_ms: u64,
}

/// Wallet configuration
#[derive(Debug, Clone)]
pub struct WalletConfig {
    pub private_key: String,
    pub min_balance_sol: f64,
}

/// Transaction assembly configuration
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    pub compute_unit_limit: u32,
    /// Priority fee in micro-lamports per compute unit; 0 disables the
    /// priority-fee instruction
    pub compute_unit_price: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Missing relay API key or wallet private key is fatal here rather
    /// than at first use: a keyless engine cannot submit anything and
    /// should not start.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let bot = BotConfig {
            min_profit_bps: get_u64_env("MIN_PROFIT_BPS", 50)?,
            max_price_impact_bps: get_u64_env("MAX_PRICE_IMPACT_BPS", 100)?,
            slippage_bps: get_u64_env("SLIPPAGE_BPS", 100)?,
        };

        let matcher = MatcherConfig {
            min_spread_pct: get_f64_env("MIN_SPREAD_PCT", 0.5)?,
            max_spread_pct: get_f64_env("MAX_SPREAD_PCT", 10.0)?,
            min_liquidity_usd: get_f64_env("MIN_LIQUIDITY_USD", 1000.0)?,
            fetch_liquidity_floor_usd: get_f64_env("FETCH_LIQUIDITY_FLOOR_USD", 5000.0)?,
        };

        let cache = CacheConfig {
            pool_ttl_ms: get_u64_env("POOL_CACHE_TTL_MS", 45_000)?,
            top_ttl_ms: get_u64_env("TOP_CACHE_TTL_MS", 300_000)?,
            top_n: get_u64_env("TOP_N", 10)? as usize,
            cache_dir: PathBuf::from(get_env_or_default("CACHE_DIR", "cache")),
        };

        let rpc = RpcConfig {
            url: get_env_or_default("RPC_ENDPOINT", "https://api.mainnet-beta.solana.com"),
            timeout_ms: get_u64_env("RPC_TIMEOUT_MS", 10_000)?,
        };

        let relay = RelayConfig {
            url: get_env_or_default("RELAY_URL", "https://fast.circular.bot/transactions"),
            api_key: std::env::var("RELAY_API_KEY")
                .map_err(|_| ArbError::ConfigurationMissing("RELAY_API_KEY"))?,
            tip_account: parse_pubkey_or_default(
                "RELAY_TIP_ACCOUNT",
                "FAST3dMFZvESiEipBvLSiXq3QCV51o3xuoHScqRU6cB6",
            )?,
            tip_lamports: get_u64_env("RELAY_TIP_LAMPORTS", 1_000_000)?,
            front_running_protection: get_bool_env("RELAY_FRONT_RUNNING_PROTECTION", false),
            submit_timeout_ms: get_u64_env("RELAY_SUBMIT_TIMEOUT_MS", 10_000)?,
        };

        let wallet = WalletConfig {
            private_key: std::env::var("WALLET_PRIVATE_KEY")
                .map_err(|_| ArbError::ConfigurationMissing("WALLET_PRIVATE_KEY"))?,
            min_balance_sol: get_f64_env("MIN_BALANCE_SOL", 0.1)?,
        };

        let execution = ExecutionConfig {
            compute_unit_limit: get_u32_env("COMPUTE_UNIT_LIMIT", 1_400_000)?,
            compute_unit_price: get_u64_env("COMPUTE_UNIT_PRICE", 0)?,
        };

        Ok(Config {
            bot,
            matcher,
            cache,
            rpc,
            relay,
            wallet,
            execution,
        })
    }
}

// ============================================================================
// Helper Functions for Environment Variable Parsing
// ============================================================================

/// Get environment variable or return default value
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get boolean environment variable with default
fn get_bool_env(key: &str, default: bool) -> bool {
    std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or(default)
}

/// Get u32 environment variable with default
fn get_u32_env(key: &str, default: u32) -> Result<u32> {
    std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .context(format!("Failed to parse {} as u32", key))
}

/// Get u64 environment variable with default
fn get_u64_env(key: &str, default: u64) -> Result<u64> {
    std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .context(format!("Failed to parse {} as u64", key))
}

/// Get f64 environment variable with default
fn get_f64_env(key: &str, default: f64) -> Result<f64> {
    std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .context(format!("Failed to parse {} as f64", key))
}

/// Parse pubkey from environment variable, falling back to a known default
fn parse_pubkey_or_default(env_var: &str, default: &str) -> Result<Pubkey> {
    let pubkey_str = std::env::var(env_var).unwrap_or_else(|_| default.to_string());
    Pubkey::from_str(&pubkey_str).context(format!("Failed to parse {} as Pubkey", env_var))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tip_account_default() {
        std::env::remove_var("RELAY_TIP_ACCOUNT");
        let pubkey = parse_pubkey_or_default(
            "RELAY_TIP_ACCOUNT",
            "FAST3dMFZvESiEipBvLSiXq3QCV51o3xuoHScqRU6cB6",
        )
        .unwrap();
        assert_eq!(
            pubkey.to_string(),
            "FAST3dMFZvESiEipBvLSiXq3QCV51o3xuoHScqRU6cB6"
        );
    }

    #[test]
    fn test_numeric_env_defaults() {
        std::env::remove_var("SOME_UNSET_U64");
        assert_eq!(get_u64_env("SOME_UNSET_U64", 50).unwrap(), 50);
        std::env::remove_var("SOME_UNSET_F64");
        assert!((get_f64_env("SOME_UNSET_F64", 0.5).unwrap() - 0.5).abs() < f64::EPSILON);
    }
}
