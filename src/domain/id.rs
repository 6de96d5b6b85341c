//! Domain identifier types with proper encapsulation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Trader account identifier (checksummed or lowercase hex address).
///
/// Accounts are normalized to lowercase on construction so that the same
/// address arriving from different log decoders maps to one index entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Account(String);

impl Account {
    /// Create a new `Account` from an address string.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into().to_ascii_lowercase())
    }

    /// Get the account as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Account {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for Account {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Market key identifier, e.g. `sETHPERP`.
///
/// Used as the label for every metric and log line emitted by an engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarketKey(String);

impl MarketKey {
    /// Create a new `MarketKey` from a string.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the market key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MarketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MarketKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_is_case_insensitive() {
        let a = Account::new("0xAbCd");
        let b = Account::from("0xabcd");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "0xabcd");
    }

    #[test]
    fn market_key_display() {
        assert_eq!(MarketKey::from("sETHPERP").to_string(), "sETHPERP");
    }
}
