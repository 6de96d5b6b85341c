//! Monetary types and 18-decimal fixed point conversion.

use rust_decimal::Decimal;

use crate::error::KeeperError;

/// Price represented as a Decimal for precision.
pub type Price = Decimal;

/// Size in base-asset units, signed (negative for shorts).
pub type Size = Decimal;

/// Number of decimals used by on-chain fixed point values.
pub const UNIT_DECIMALS: u32 = 18;

/// Convert a raw 18-decimal fixed point value into a [`Decimal`].
///
/// # Errors
///
/// Returns [`KeeperError::Overflow`] when the value exceeds the 96-bit
/// mantissa supported by `Decimal`.
pub fn from_wei(raw: i128) -> Result<Decimal, KeeperError> {
    Decimal::try_from_i128_with_scale(raw, UNIT_DECIMALS).map_err(|_| KeeperError::Overflow {
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const UNIT: i128 = 1_000_000_000_000_000_000;

    #[test]
    fn from_wei_scales_by_unit() {
        assert_eq!(from_wei(UNIT).unwrap(), dec!(1));
        assert_eq!(from_wei(-UNIT / 2).unwrap(), dec!(-0.5));
        assert_eq!(from_wei(40_000 * UNIT).unwrap(), dec!(40000));
    }

    #[test]
    fn from_wei_rejects_values_outside_mantissa() {
        assert!(matches!(
            from_wei(i128::MAX),
            Err(KeeperError::Overflow { .. })
        ));
    }
}
