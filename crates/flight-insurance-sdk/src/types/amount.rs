//! SUI amount conversion
//!
//! Form fields carry decimal SUI; the contract works in MIST.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::{PolicyError, Result};

/// 1 SUI = 1_000_000_000 MIST
pub const MIST_PER_SUI: u64 = 1_000_000_000;

/// Convert a decimal SUI string to MIST, truncating sub-MIST digits.
pub fn sui_to_mist(amount: &str) -> Result<u64> {
    let trimmed = amount.trim();
    let value = Decimal::from_str(trimmed).map_err(|e| {
        PolicyError::InvalidInput(format!("'{}' is not a SUI amount: {}", amount, e))
    })?;

    if value.is_sign_negative() && !value.is_zero() {
        return Err(PolicyError::InvalidInput(format!(
            "SUI amount must not be negative: {}",
            amount
        )));
    }

    value
        .checked_mul(Decimal::from(MIST_PER_SUI))
        .map(|mist| mist.trunc())
        .and_then(|mist| mist.to_u64())
        .ok_or_else(|| {
            PolicyError::InvalidInput(format!("SUI amount out of range: {}", amount))
        })
}

/// Convert MIST to SUI without rounding.
pub fn mist_to_sui(mist: u64) -> Decimal {
    (Decimal::from(mist) / Decimal::from(MIST_PER_SUI)).normalize()
}
