use anyhow::{Context, Result};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{signature::Keypair, signer::Signer};
use std::io::Write;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use solana_cross_arb::arbitrage::ArbitrageExecution;
use solana_cross_arb::cache::{CachedOpportunity, SystemClock};
use solana_cross_arb::config::{Config, WalletConfig};
use solana_cross_arb::engine::ArbEngine;
use solana_cross_arb::venue::{MeteoraClient, RaydiumClient, VenueClient};

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .expect("Failed to create EnvFilter");

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false))
        .init();

    info!("🚀 Starting cross-venue arbitrage engine...");

    let config = Config::load().context("Failed to load configuration")?;
    info!("✅ Configuration loaded");
    info!(
        "   Min profit: {} bps, spread band: {:.1}%-{:.1}%, liquidity floor: ${:.0}",
        config.bot.min_profit_bps,
        config.matcher.min_spread_pct,
        config.matcher.max_spread_pct,
        config.matcher.min_liquidity_usd
    );

    let payer = load_keypair(&config.wallet)?;
    let wallet_address = payer.pubkey();
    info!("✅ Wallet loaded: {}", wallet_address);

    let rpc_client = Arc::new(RpcClient::new(config.rpc.url.clone()));
    info!("✅ RPC client initialized: {}", config.rpc.url);

    match rpc_client.get_balance(&wallet_address).await {
        Ok(balance) => {
            let balance_sol = balance as f64 / 1e9;
            info!("💰 Wallet balance: {:.4} SOL", balance_sol);
            if balance_sol < config.wallet.min_balance_sol {
                warn!(
                    "⚠️  Low wallet balance! Current: {:.4} SOL, Minimum: {:.2} SOL",
                    balance_sol, config.wallet.min_balance_sol
                );
            }
        }
        Err(e) => {
            error!("❌ Failed to check wallet balance: {}", e);
            warn!("   Continuing anyway, but submission may fail");
        }
    }

    let raydium: Arc<dyn VenueClient> = Arc::new(RaydiumClient::new(
        config.rpc.timeout_ms,
        config.matcher.fetch_liquidity_floor_usd,
    ));
    let meteora: Arc<dyn VenueClient> = Arc::new(MeteoraClient::new(
        config.rpc.timeout_ms,
        config.matcher.fetch_liquidity_floor_usd,
    ));

    let engine = ArbEngine::new(
        &config,
        raydium,
        meteora,
        Arc::clone(&rpc_client),
        Arc::new(SystemClock),
    );

    info!("🔍 Running detection cycle across Raydium and Meteora...");
    let opportunities = engine
        .detect()
        .await
        .context("Detection cycle failed on both venues")?;

    if opportunities.is_empty() {
        info!("No arbitrage opportunities found this cycle");
        return Ok(());
    }

    print_opportunities(&opportunities);

    let index = prompt_index(opportunities.len())?;
    let selected = &opportunities[index - 1];
    let amount_sol = prompt_amount()?;

    println!();
    println!(
        "About to execute: {} | {} | {:.2}% expected | {} SOL",
        selected.opportunity.pair_name,
        selected.opportunity.direction_label(),
        selected.opportunity.expected_profit_pct,
        amount_sol
    );
    if !prompt_confirm()? {
        info!("Execution cancelled by operator");
        return Ok(());
    }

    let execution = ArbitrageExecution::new(selected.opportunity.clone(), amount_sol);
    match engine.execute(&execution, &payer).await {
        Ok(signature) => {
            info!("✅ Transaction accepted by relay");
            info!("   Signature: {}", signature);
            info!("   https://solscan.io/tx/{}", signature);
        }
        Err(e) => {
            error!("❌ Execution failed: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Load the wallet keypair from the base58 private key in the environment
fn load_keypair(wallet_config: &WalletConfig) -> Result<Keypair> {
    let decoded = bs58::decode(&wallet_config.private_key)
        .into_vec()
        .context("Failed to decode base58 private key")?;
    Keypair::from_bytes(&decoded).context("Failed to create keypair from bytes")
}

fn print_opportunities(opportunities: &[CachedOpportunity]) {
    println!();
    println!("🎯 Top arbitrage opportunities:");
    println!(
        "{:<4} {:<16} {:<28} {:>10} {:>12} {:>12}",
        "#", "Pair", "Direction", "Profit %", "Ray liq $", "Met liq $"
    );
    for (i, cached) in opportunities.iter().enumerate() {
        println!(
            "{:<4} {:<16} {:<28} {:>9.2}% {:>12.0} {:>12.0}",
            i + 1,
            cached.opportunity.pair_name,
            cached.opportunity.direction_label(),
            cached.opportunity.expected_profit_pct,
            cached.raydium_pool.liquidity,
            cached.meteora_pool.liquidity,
        );
    }
    println!();
}

fn prompt(message: &str) -> Result<String> {
    print!("{}", message);
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// 1-based opportunity index; defaults to the top-ranked entry
fn prompt_index(count: usize) -> Result<usize> {
    let raw = prompt(&format!("Select opportunity [1-{}] (default 1): ", count))?;
    if raw.is_empty() {
        return Ok(1);
    }
    match raw.parse::<usize>() {
        Ok(n) if n >= 1 && n <= count => Ok(n),
        _ => {
            warn!("Invalid selection '{}', using 1", raw);
            Ok(1)
        }
    }
}

/// Trade size in SOL; anything unparseable falls back to 0.1 SOL
fn prompt_amount() -> Result<f64> {
    let raw = prompt("Amount in SOL (default 0.1): ")?;
    if raw.is_empty() {
        return Ok(0.1);
    }
    match raw.parse::<f64>() {
        Ok(amount) if amount > 0.0 => Ok(amount),
        _ => {
            warn!("Invalid amount '{}', using 0.1 SOL", raw);
            Ok(0.1)
        }
    }
}

fn prompt_confirm() -> Result<bool> {
    let raw = prompt("Proceed? [y/N]: ")?;
    Ok(raw.eq_ignore_ascii_case("y") || raw.eq_ignore_ascii_case("yes"))
}
