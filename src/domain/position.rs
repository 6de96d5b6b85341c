//! Open positions tracked by the liquidation keeper.

use rust_decimal::Decimal;

use super::id::Account;
use super::money::{Price, Size};

/// An open position as seen through the event log.
///
/// The liquidation price is an estimate cached from the last check that
/// found the position healthy. `None` means it has never been computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    id: u64,
    account: Account,
    size: Size,
    leverage: Decimal,
    liquidation_price: Option<Price>,
    liquidation_price_updated_at: u64,
}

impl Position {
    /// Create a position with an unknown liquidation price.
    pub fn new(id: u64, account: Account, size: Size, leverage: Decimal) -> Self {
        Self {
            id,
            account,
            size,
            leverage,
            liquidation_price: None,
            liquidation_price_updated_at: 0,
        }
    }

    /// Builder-style helper to attach a cached liquidation price.
    #[must_use]
    pub fn with_liquidation_price(mut self, price: Price, updated_at: u64) -> Self {
        self.record_liquidation_price(price, updated_at);
        self
    }

    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub const fn account(&self) -> &Account {
        &self.account
    }

    #[must_use]
    pub const fn size(&self) -> Size {
        self.size
    }

    #[must_use]
    pub const fn leverage(&self) -> Decimal {
        self.leverage
    }

    #[must_use]
    pub const fn liquidation_price(&self) -> Option<Price> {
        self.liquidation_price
    }

    /// Block tip timestamp at which the liquidation price was cached.
    #[must_use]
    pub const fn liquidation_price_updated_at(&self) -> u64 {
        self.liquidation_price_updated_at
    }

    /// Apply a position update from the event log.
    ///
    /// Keeps the cached liquidation price; it is refreshed by the next check.
    pub fn update(&mut self, id: u64, size: Size, leverage: Decimal) {
        self.id = id;
        self.size = size;
        self.leverage = leverage;
    }

    /// Cache a freshly computed liquidation price.
    pub fn record_liquidation_price(&mut self, price: Price, updated_at: u64) {
        self.liquidation_price = Some(price);
        self.liquidation_price_updated_at = updated_at;
    }

    /// Notional value at the given price, signed by direction.
    #[must_use]
    pub fn notional(&self, price: Price) -> Decimal {
        self.size * price
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn new_position_has_unknown_liquidation_price() {
        let position = Position::new(1, Account::from("0xa"), dec!(2), dec!(3));
        assert_eq!(position.liquidation_price(), None);
        assert_eq!(position.liquidation_price_updated_at(), 0);
    }

    #[test]
    fn update_keeps_cached_liquidation_price() {
        let mut position = Position::new(1, Account::from("0xa"), dec!(2), dec!(3))
            .with_liquidation_price(dec!(1500), 42);

        position.update(2, dec!(-1), dec!(1.5));

        assert_eq!(position.id(), 2);
        assert_eq!(position.size(), dec!(-1));
        assert_eq!(position.liquidation_price(), Some(dec!(1500)));
        assert_eq!(position.liquidation_price_updated_at(), 42);
    }

    #[test]
    fn notional_is_signed() {
        let short = Position::new(1, Account::from("0xa"), dec!(-2), dec!(1));
        assert_eq!(short.notional(dec!(100)), dec!(-200));
    }
}
