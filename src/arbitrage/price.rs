// Price normalization across heterogeneous venue quoting conventions.
//
// Raydium quotes pairs base/quote with SOL on either side; Meteora quotes
// token_x-token_y. Both are reduced to one canonical form before matching:
// token units per one SOL.

use crate::error::ArbError;

/// Convert a raw venue quote into the canonical token-per-SOL price.
///
/// `base_is_second` indicates SOL is the second member of the raw pair,
/// in which case the quote is inverted. Zero and non-finite raw prices
/// are rejected; they must never be coerced or passed through.
pub fn normalize_price(
    raw: f64,
    base_is_second: bool,
    venue: &'static str,
) -> Result<f64, ArbError> {
    if raw == 0.0 || !raw.is_finite() {
        return Err(ArbError::InvalidQuote { venue, raw });
    }
    if base_is_second {
        Ok(1.0 / raw)
    } else {
        Ok(raw)
    }
}

/// Relative price difference between two venues, in percent:
/// `(a - b) / min(a, b) * 100`.
pub fn spread_pct(price_a: f64, price_b: f64) -> f64 {
    (price_a - price_b) / price_a.min(price_b) * 100.0
}
