//! Money value object.
//!
//! Amounts are held as integer minor units of their currency (đồng for VND,
//! cents for USD/EUR). Binary floating point never touches a price: every
//! operation is overflow-checked integer arithmetic, so a stored total can be
//! formatted, parsed and summed again without drift.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Currencies accepted by listings and add-ons.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Vietnamese đồng (no minor unit)
    Vnd,
    /// US dollar (cents)
    Usd,
    /// Euro (cents)
    Eur,
}

impl Currency {
    /// ISO 4217 code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Vnd => "VND",
            Self::Usd => "USD",
            Self::Eur => "EUR",
        }
    }

    /// Number of decimal digits carried by the minor unit.
    #[must_use]
    pub const fn decimals(self) -> u32 {
        match self {
            Self::Vnd => 0,
            Self::Usd | Self::Eur => 2,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "VND" => Ok(Self::Vnd),
            "USD" => Ok(Self::Usd),
            "EUR" => Ok(Self::Eur),
            other => Err(MoneyError::UnknownCurrency(other.to_string())),
        }
    }
}

/// Errors from money arithmetic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// Two amounts in different currencies were combined.
    #[error("Currency mismatch: expected {expected}, found {found}")]
    CurrencyMismatch {
        /// Currency of the left-hand amount
        expected: Currency,
        /// Currency of the right-hand amount
        found: Currency,
    },

    /// The result does not fit in 64 bits of minor units.
    #[error("Monetary amount overflow")]
    Overflow,

    /// Currency code is not supported.
    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),
}

/// An amount of money in integer minor units.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    minor_units: u64,
    currency: Currency,
}

impl Money {
    /// Creates an amount from minor units.
    #[must_use]
    pub const fn new(minor_units: u64, currency: Currency) -> Self {
        Self {
            minor_units,
            currency,
        }
    }

    /// Zero in the given currency.
    #[must_use]
    pub const fn zero(currency: Currency) -> Self {
        Self::new(0, currency)
    }

    /// Amount in minor units.
    #[must_use]
    pub const fn minor_units(&self) -> u64 {
        self.minor_units
    }

    /// Currency of this amount.
    #[must_use]
    pub const fn currency(&self) -> Currency {
        self.currency
    }

    /// Checks if the amount is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.minor_units == 0
    }

    /// Adds two amounts of the same currency.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::CurrencyMismatch`] for different currencies and
    /// [`MoneyError::Overflow`] if the sum does not fit.
    pub const fn checked_add(self, other: Self) -> Result<Self, MoneyError> {
        if !same_currency(self.currency, other.currency) {
            return Err(MoneyError::CurrencyMismatch {
                expected: self.currency,
                found: other.currency,
            });
        }
        match self.minor_units.checked_add(other.minor_units) {
            Some(sum) => Ok(Self::new(sum, self.currency)),
            None => Err(MoneyError::Overflow),
        }
    }

    /// Multiplies by a count (guests, nights, quantity).
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if the product does not fit.
    pub const fn checked_mul(self, factor: u32) -> Result<Self, MoneyError> {
        match self.minor_units.checked_mul(factor as u64) {
            Some(product) => Ok(Self::new(product, self.currency)),
            None => Err(MoneyError::Overflow),
        }
    }

    /// Percentage of this amount expressed in basis points (1/100 of a
    /// percent), rounded half-up to the minor unit.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if the intermediate product does not fit.
    pub const fn basis_points(self, bps: u32) -> Result<Self, MoneyError> {
        match self.minor_units.checked_mul(bps as u64) {
            Some(product) => match product.checked_add(5_000) {
                Some(rounded) => Ok(Self::new(rounded / 10_000, self.currency)),
                None => Err(MoneyError::Overflow),
            },
            None => Err(MoneyError::Overflow),
        }
    }

    /// Sums an iterator of amounts, all in `currency`.
    ///
    /// # Errors
    ///
    /// Propagates the first mismatch or overflow.
    pub fn sum<I>(currency: Currency, amounts: I) -> Result<Self, MoneyError>
    where
        I: IntoIterator<Item = Self>,
    {
        amounts
            .into_iter()
            .try_fold(Self::zero(currency), Self::checked_add)
    }
}

const fn same_currency(a: Currency, b: Currency) -> bool {
    matches!(
        (a, b),
        (Currency::Vnd, Currency::Vnd) | (Currency::Usd, Currency::Usd) | (Currency::Eur, Currency::Eur)
    )
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let decimals = self.currency.decimals();
        let scale = 10_u64.pow(decimals);
        let whole = group_thousands(self.minor_units / scale);
        if decimals == 0 {
            write!(f, "{whole} {}", self.currency)
        } else {
            let frac = self.minor_units % scale;
            write!(
                f,
                "{whole}.{frac:0width$} {}",
                self.currency,
                width = decimals as usize
            )
        }
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
