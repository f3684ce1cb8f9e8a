//! # Money Module
//!
//! Amount helpers on top of `rust_decimal::Decimal`.
//!
//! Expensebook tracks a single currency with two minor digits, so amounts are
//! plain `Decimal`s rather than a currency-tagged type. Storage keeps them as
//! TEXT, which is why parsing and formatting live here.

use crate::error::{CoreError, CoreResult};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Number of minor digits kept for every amount (paise / cents).
pub const MONEY_SCALE: u32 = 2;

/// Parse an amount from user or storage text.
///
/// # Examples
/// ```
/// use expensebook_core::money::parse_amount;
/// use rust_decimal::Decimal;
///
/// assert_eq!(parse_amount(" 400.50 ").unwrap(), Decimal::new(40050, 2));
/// assert!(parse_amount("abc").is_err());
/// ```
pub fn parse_amount(text: &str) -> CoreResult<Decimal> {
    let trimmed = text.trim();
    let value =
        Decimal::from_str(trimmed).map_err(|_| CoreError::InvalidAmount(trimmed.to_string()))?;
    if value.normalize().scale() > MONEY_SCALE {
        return Err(CoreError::InvalidAmount(format!(
            "{} has more than {} decimal places",
            trimmed, MONEY_SCALE
        )));
    }
    Ok(value)
}

/// Canonical text form used for storage: fixed two-digit scale.
///
/// Every stored amount goes through this, so equal amounts always have
/// equal text. The payment compare-and-swap relies on that.
pub fn to_storage(amount: Decimal) -> String {
    let mut value = amount;
    value.rescale(MONEY_SCALE);
    value.to_string()
}

/// Check that an amount is strictly positive
pub fn is_positive(amount: Decimal) -> bool {
    amount > Decimal::ZERO
}
