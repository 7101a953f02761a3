//! USD valuation with defensive numeric handling.

use serde_json::Value;

/// Returns `value` when it is finite, 0 otherwise. Negative zero becomes 0.
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value + 0.0 } else { 0.0 }
}

/// Adds two finite numbers, clamping an overflow to `±f64::MAX`.
pub fn saturating_add(total: f64, value: f64) -> f64 {
    let sum = total + value;
    if sum.is_finite() {
        sum + 0.0
    } else if sum.is_sign_negative() {
        f64::MIN
    } else {
        f64::MAX
    }
}

/// Sums finite values without ever producing `inf` or `NaN`.
pub fn finite_sum(values: impl IntoIterator<Item = f64>) -> f64 {
    values
        .into_iter()
        .map(finite_or_zero)
        .fold(0.0, saturating_add)
}

/// Coerces a loosely typed payload value into a finite number.
///
/// Numbers and numeric strings are accepted. Everything else, including
/// `NaN`/`inf` spellings, yields `None`.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

/// USD value of `amount` units at `price_usd` per unit.
///
/// Only a positive price and a non-zero amount produce a value; a missing,
/// zero or negative price never contributes to a total.
pub fn value_usd(price_usd: f64, amount: f64) -> f64 {
    let price = finite_or_zero(price_usd);
    let amount = finite_or_zero(amount);
    if price > 0.0 && amount != 0.0 {
        finite_or_zero(price * amount)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_usd_requires_price_and_amount() {
        assert_eq!(value_usd(1.5, 0.0), 0.0);
        assert_eq!(value_usd(0.0, 100.0), 0.0);
        assert_eq!(value_usd(2.0, 10.0), 20.0);
    }

    #[test]
    fn test_value_usd_ignores_negative_price() {
        assert_eq!(value_usd(-3.0, 10.0), 0.0);
    }

    #[test]
    fn test_value_usd_keeps_negative_amount() {
        assert_eq!(value_usd(2.0, -1.0), -2.0);
    }

    #[test]
    fn test_value_usd_non_finite_inputs() {
        assert_eq!(value_usd(f64::NAN, 10.0), 0.0);
        assert_eq!(value_usd(2.0, f64::INFINITY), 0.0);
        assert_eq!(value_usd(f64::MAX, f64::MAX), 0.0);
    }

    #[test]
    fn test_value_usd_underflow_is_positive_zero() {
        let value = value_usd(1e-200, -1e-200);
        assert_eq!(value, 0.0);
        assert!(value.is_sign_positive());
        assert!(finite_or_zero(-0.0).is_sign_positive());
    }

    #[test]
    fn test_finite_sum_saturates() {
        assert_eq!(finite_sum([1.0, 2.5, -0.5]), 3.0);
        assert_eq!(finite_sum([1e308, 1e308]), f64::MAX);
        assert_eq!(finite_sum([-1e308, -1e308]), f64::MIN);
        assert_eq!(finite_sum([f64::NAN, 4.0]), 4.0);
        assert!(finite_sum(Vec::new()).is_sign_positive());
    }

    #[test]
    fn test_coerce_number() {
        assert_eq!(coerce_number(&json!(1.25)), Some(1.25));
        assert_eq!(coerce_number(&json!(" 42 ")), Some(42.0));
        assert_eq!(coerce_number(&json!("NaN")), None);
        assert_eq!(coerce_number(&json!("abc")), None);
        assert_eq!(coerce_number(&json!(true)), None);
        assert_eq!(coerce_number(&Value::Null), None);
        assert_eq!(coerce_number(&json!({"price": 1})), None);
    }
}
