//! Significant-figure formatting
//!
//! Results are rounded half-to-even at the requested number of significant
//! figures and rendered in plain decimal notation, never scientific.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Format `value` to `sig` significant figures
///
/// Trailing zeros after the decimal point and a dangling point are removed.
/// Zero and non-finite inputs render as "0".
pub fn format_sigfigs(value: f64, sig: u32) -> String {
    if value == 0.0 || !value.is_finite() || sig == 0 {
        return "0".to_string();
    }

    // Exact binary value first so ties are judged the way the float really is
    let exact = Decimal::from_f64_retain(value).or_else(|| Decimal::from_f64(value));
    let rounded = exact.and_then(|d| d.round_sf_with_strategy(sig, RoundingStrategy::MidpointNearestEven));

    match rounded {
        Some(d) => {
            let text = d.normalize().to_string();
            if text == "-0" || text.is_empty() {
                "0".to_string()
            } else {
                text
            }
        }
        // Outside Decimal's range: magnitude is so large no fraction remains
        None => fallback_large(value, sig),
    }
}

fn fallback_large(value: f64, sig: u32) -> String {
    let power = value.abs().log10().floor() as i32;
    let scale = 10f64.powi(power + 1 - sig as i32);
    let rounded = (value / scale).round() * scale;
    format!("{:.0}", rounded)
}
