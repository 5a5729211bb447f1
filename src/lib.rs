// Cross-venue Solana arbitrage engine.
//
// Detects price discrepancies for SOL pairs listed on both Raydium and
// Meteora, ranks them, and executes the best ones as single atomic
// transactions submitted through a private relay:
// - Venue adapters normalizing pair-API snapshots to a canonical price
// - Cross-venue matching keyed by mint address, spread band, ranking
// - Transaction assembly (compute budget, both legs, relay tip)
// - Pre-submission profit guard and price-impact ceiling
// - Relay submission with JSON-RPC envelope normalization

pub mod arbitrage;
pub mod cache;
pub mod chain;
pub mod config;
pub mod engine;
pub mod error;
pub mod retry;
pub mod venue;
