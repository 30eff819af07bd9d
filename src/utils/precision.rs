// src/utils/precision.rs
use crate::types::LotSizeRule;
use rust_decimal::Decimal;

/// Rounds a quantity DOWN to the nearest multiple of step_size.
/// Example: amount=10.999, step=1.0 -> 10.0
pub fn normalize_quantity(amount: Decimal, step_size: Decimal) -> Decimal {
    if step_size.is_zero() {
        return amount;
    }
    (amount / step_size).floor() * step_size
}

/// Applies a symbol's LOT_SIZE rule: floor to step, then clamp into
/// [min_qty, max_qty]. No rule means no constraint (pass-through), a
/// defined degenerate case for symbols the exchange reports no filter for.
pub fn quantize(amount: Decimal, rule: Option<&LotSizeRule>) -> Decimal {
    let Some(rule) = rule else {
        return amount;
    };
    let stepped = normalize_quantity(amount, rule.step_size);
    stepped.clamp(rule.min_qty, rule.max_qty)
}
