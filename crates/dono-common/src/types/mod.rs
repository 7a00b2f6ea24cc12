//! Domain value types shared across dono crates

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CommonError;

/// Code of the currency every donation amount is converted into.
pub const BASE_CURRENCY: &str = "USD";

/// Currency code attached to a donation or an exchange rate (e.g. `AUD`)
///
/// Codes are compared exactly; no case folding is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencySign(String);

impl CurrencySign {
    /// The base currency (`USD`)
    pub fn base() -> Self {
        Self(BASE_CURRENCY.to_string())
    }

    /// Whether amounts in this currency need no conversion
    pub fn is_base(&self) -> bool {
        self.0 == BASE_CURRENCY
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for CurrencySign {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CommonError::InvalidCurrency(s.to_string()));
        }
        Ok(Self(code.to_string()))
    }
}

impl fmt::Display for CurrencySign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for CurrencySign {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for CurrencySign {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
