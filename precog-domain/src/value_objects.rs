//! Value Objects for the Precog domain
//!
//! Immutable, validated domain primitives.
//! All value objects enforce invariants at construction time.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain errors for value object validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Price must be positive with at most 4 fractional digits
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    /// Fraction must lie in the documented range
    #[error("Invalid fraction: {0}")]
    InvalidFraction(String),

    /// Ticker must be non-empty without whitespace
    #[error("Invalid ticker: {0}")]
    InvalidTicker(String),

    /// Identifier (event, sport) must be non-empty
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// RiskLimits validation error
    #[error("Invalid risk limits: {0}")]
    InvalidRiskLimits(String),

    /// Exit rule configuration validation error
    #[error("Invalid exit rules: {0}")]
    InvalidExitRules(String),

    /// Invalid state transition
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),
}

// =============================================================================
// Price
// =============================================================================

/// Price represents a positive decimal contract price
///
/// # Invariants
/// - Must be > 0
/// - At most [`Price::SCALE`] fractional digits
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Price(Decimal);

impl Price {
    /// Number of fractional digits every price carries
    pub const SCALE: u32 = 4;

    /// Create a new Price with validation
    ///
    /// # Examples
    /// ```
    /// # use precog_domain::value_objects::Price;
    /// # use rust_decimal_macros::dec;
    /// assert!(Price::new(dec!(0.5625)).is_ok());
    /// assert!(Price::new(dec!(0.56251)).is_err()); // five fractional digits
    /// assert!(Price::new(dec!(0)).is_err());
    /// ```
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPrice` if value <= 0 or carries more than
    /// four significant fractional digits.
    pub fn new(value: Decimal) -> Result<Self, DomainError> {
        if value <= Decimal::ZERO {
            return Err(DomainError::InvalidPrice(format!("price must be positive, got {}", value)));
        }

        let normalized = value.normalize();
        if normalized.scale() > Self::SCALE {
            return Err(DomainError::InvalidPrice(format!(
                "price {} has more than {} fractional digits",
                value,
                Self::SCALE
            )));
        }

        let mut fixed = normalized;
        fixed.rescale(Self::SCALE);
        Ok(Self(fixed))
    }

    /// Create a Price from a computed value, rounding to four digits
    ///
    /// Uses midpoint-nearest-even rounding so repeated computations stay stable.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPrice` if the rounded value is not positive.
    pub fn from_computed(value: Decimal) -> Result<Self, DomainError> {
        let rounded = value.round_dp_with_strategy(Self::SCALE, RoundingStrategy::MidpointNearestEven);
        Self::new(rounded)
    }

    /// Get the underlying Decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<Decimal> for Price {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

// =============================================================================
// Fractions
// =============================================================================

/// Validate that a fraction lies in (0, 1]
///
/// Used for exit, add and reduce fractions on position actions.
pub fn validate_unit_fraction(name: &str, value: Decimal) -> Result<Decimal, DomainError> {
    if value <= Decimal::ZERO || value > Decimal::ONE {
        return Err(DomainError::InvalidFraction(format!("{} must be in (0, 1], got {}", name, value)));
    }
    Ok(value)
}

// =============================================================================
// Side
// =============================================================================

/// Side of a binary-market holding
///
/// Prices are always quoted in YES terms. A `Yes` holding profits when the
/// price rises, a `No` holding profits when it falls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Holding pays out if the market resolves YES
    Yes,
    /// Holding pays out if the market resolves NO
    No,
}

impl Side {
    /// Sign-normalized favorable move as a fraction of entry price
    ///
    /// Positive means the position is in profit regardless of side.
    ///
    /// ```
    /// # use precog_domain::value_objects::{Price, Side};
    /// # use rust_decimal_macros::dec;
    /// let entry = Price::new(dec!(0.50)).unwrap();
    /// let up = Price::new(dec!(0.56)).unwrap();
    /// assert_eq!(Side::Yes.favorable_gain(entry, up), Some(dec!(0.12)));
    /// assert_eq!(Side::No.favorable_gain(entry, up), Some(dec!(-0.12)));
    /// ```
    ///
    /// Returns `None` only on decimal overflow.
    pub fn favorable_gain(&self, entry: Price, current: Price) -> Option<Decimal> {
        let move_ = match self {
            Side::Yes => current.as_decimal().checked_sub(entry.as_decimal())?,
            Side::No => entry.as_decimal().checked_sub(current.as_decimal())?,
        };
        move_.checked_div(entry.as_decimal()).map(|g| g.normalize())
    }

    /// Whether `candidate` is strictly more favorable than `reference`
    pub fn is_more_favorable(&self, candidate: Price, reference: Price) -> bool {
        match self {
            Side::Yes => candidate > reference,
            Side::No => candidate < reference,
        }
    }

    /// The more favorable of two prices (higher for Yes, lower for No)
    pub fn most_favorable(&self, a: Price, b: Price) -> Price {
        if self.is_more_favorable(a, b) {
            a
        } else {
            b
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Yes => write!(f, "yes"),
            Side::No => write!(f, "no"),
        }
    }
}

// =============================================================================
// Ticker
// =============================================================================

/// Market ticker (e.g., `KXNFLGAME-25NOV16KCBUF-KC`)
///
/// # Invariants
/// - Non-empty
/// - No whitespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Ticker(String);

impl Ticker {
    /// Create a Ticker with validation
    ///
    /// # Errors
    /// Returns `DomainError::InvalidTicker` if empty or containing whitespace
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.is_empty() {
            return Err(DomainError::InvalidTicker("ticker must be non-empty".to_string()));
        }
        if value.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidTicker(format!("ticker '{}' contains whitespace", value)));
        }
        Ok(Self(value))
    }

    /// Get the ticker as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Sport / Event
// =============================================================================

/// Sport category used for per-sport exposure limits (e.g., `nfl`, `ncaaf`)
///
/// Stored lower-cased so `NFL` and `nfl` are the same category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Sport(String);

impl Sport {
    /// Create a Sport, normalizing to lower case
    pub fn new(value: impl AsRef<str>) -> Result<Self, DomainError> {
        let value = value.as_ref().trim();
        if value.is_empty() {
            return Err(DomainError::InvalidIdentifier("sport must be non-empty".to_string()));
        }
        Ok(Self(value.to_lowercase()))
    }

    /// Get the category name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the underlying real-world event (game, match)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(String);

impl EventId {
    /// Create an EventId with validation
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::InvalidIdentifier("event id must be non-empty".to_string()));
        }
        Ok(Self(value))
    }

    /// Get the identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Tests
// =============================================================================
