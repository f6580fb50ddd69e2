use std::str::FromStr;

use bigdecimal::{BigDecimal, One, ToPrimitive, Zero};
use serde_json::Value;

use crate::error::UpstreamDataError;
use crate::types::ReserveQuote;

/// Significant digits kept after every multiplication in the APR -> APY step.
pub const WORKING_PRECISION: u64 = 40;

/// Daily compounding.
pub const COMPOUNDING_PERIODS: u32 = 365;

/// Upstream rates outside these bounds are rejected before any arithmetic:
/// aligning scales of an extreme exponent allocates an enormous integer.
pub const MAX_DECIMAL_TEXT_LEN: usize = 128;
pub const MAX_DECIMAL_SCALE: i64 = 1_000;

/// Net borrow cost: protocol APY minus the compounded incentive APRs,
/// floored at zero.
pub fn compute_rates(protocol_apy: BigDecimal, incentive_aprs: &[BigDecimal]) -> ReserveQuote {
    let total_incentive_apr = incentive_aprs
        .iter()
        .fold(BigDecimal::zero(), |acc, apr| acc + apr);
    let incentive_apy = apr_to_apy(&total_incentive_apr);

    let net = &protocol_apy - &incentive_apy;
    let total_apy = if net < BigDecimal::zero() {
        BigDecimal::zero()
    } else {
        net
    };

    ReserveQuote {
        protocol_apy,
        incentive_apy,
        total_apy,
    }
}

/// `(1 + apr / 365)^365 - 1`
pub fn apr_to_apy(apr: &BigDecimal) -> BigDecimal {
    if apr.is_zero() {
        return BigDecimal::zero();
    }

    let periods = BigDecimal::from(COMPOUNDING_PERIODS as i64);
    let per_period = (BigDecimal::one() + apr / &periods).with_prec(WORKING_PRECISION);

    pow_rounded(&per_period, COMPOUNDING_PERIODS) - BigDecimal::one()
}

/// Exponentiation by squaring, rounding each product so the digit count
/// stays bounded.
fn pow_rounded(base: &BigDecimal, mut exp: u32) -> BigDecimal {
    let mut result = BigDecimal::one();
    let mut square = base.clone();

    while exp > 0 {
        if exp & 1 == 1 {
            result = (&result * &square).with_prec(WORKING_PRECISION);
        }
        exp >>= 1;
        if exp > 0 {
            square = (&square * &square).with_prec(WORKING_PRECISION);
        }
    }

    result
}

/// Builds a decimal from an upstream `value` field. The API sends these as
/// strings, but plain JSON numbers are accepted too.
pub fn parse_decimal(field: &'static str, raw: &Value) -> Result<BigDecimal, UpstreamDataError> {
    let text = match raw {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    };

    if text.len() > MAX_DECIMAL_TEXT_LEN {
        return Err(UpstreamDataError::InvalidDecimal { field, value: text });
    }

    let value = match BigDecimal::from_str(&text) {
        Ok(value) => value,
        Err(_) => return Err(UpstreamDataError::InvalidDecimal { field, value: text }),
    };

    let (_, scale) = value.as_bigint_and_exponent();
    if scale.abs() > MAX_DECIMAL_SCALE {
        return Err(UpstreamDataError::InvalidDecimal { field, value: text });
    }

    Ok(value)
}

/// Fraction to a percentage string, e.g. `0.0523` -> `5.23%`.
pub fn format_percent(value: &BigDecimal) -> String {
    let pct = (value * &BigDecimal::from(100i64)).to_f64().unwrap_or(0.0);
    format!("{:.2}%", pct)
}
