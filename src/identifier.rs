//! Order identifier parsing and validation
//!
//! Identifier sets use a compact list syntax: comma-separated single ids and
//! inclusive ranges, e.g. `1-10,15,20-22`.

use std::collections::BTreeSet;
use std::fmt;
use tracing::warn;

/// Upper bound on the number of identifiers a single set may expand to
pub const MAX_IDS: usize = 10_000_000;

/// Identifier of one remote order
///
/// # Examples
///
/// ```
/// use order_fetcher::identifier::OrderId;
///
/// let id: OrderId = "42".parse().unwrap();
/// assert_eq!(id.get(), 42);
/// assert_eq!(id.to_string(), "42");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderId(u64);

impl OrderId {
    /// Wrap a raw numeric identifier
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for OrderId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for OrderId {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        trimmed
            .parse::<u64>()
            .map(Self)
            .map_err(|_| IdentifierError::InvalidId(trimmed.to_string()))
    }
}

/// Ordered, duplicate-free set of identifiers to fetch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdSet {
    ids: BTreeSet<OrderId>,
}

impl IdSet {
    /// Parse an identifier set expression such as `1-10,15,20-22`
    ///
    /// Whitespace around items is ignored. Duplicates are dropped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error for empty input, non-numeric ids, reversed ranges, or
    /// sets larger than [`MAX_IDS`].
    pub fn parse(s: &str) -> Result<Self, IdentifierError> {
        if s.trim().is_empty() {
            return Err(IdentifierError::Empty);
        }

        let mut ids = BTreeSet::new();
        let mut duplicates = 0usize;

        for item in s.split(',') {
            let item = item.trim();
            if item.is_empty() {
                return Err(IdentifierError::InvalidFormat(
                    "empty item in identifier list".to_string(),
                ));
            }

            let (start, end) = match item.split_once('-') {
                Some((start, end)) => (start.parse::<OrderId>()?, end.parse::<OrderId>()?),
                None => {
                    let id = item.parse::<OrderId>()?;
                    (id, id)
                }
            };

            if end < start {
                return Err(IdentifierError::ReversedRange {
                    start: start.get(),
                    end: end.get(),
                });
            }

            let span = end.get() - start.get();
            if span >= MAX_IDS as u64 || ids.len() + span as usize >= MAX_IDS {
                return Err(IdentifierError::TooMany(MAX_IDS));
            }

            for raw in start.get()..=end.get() {
                if !ids.insert(OrderId(raw)) {
                    duplicates += 1;
                }
            }
        }

        if duplicates > 0 {
            warn!(duplicates, "Dropped duplicate identifiers from identifier set");
        }

        Ok(Self { ids })
    }

    /// Number of identifiers
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Identifiers in ascending order
    pub fn into_vec(self) -> Vec<OrderId> {
        self.ids.into_iter().collect()
    }
}

/// Identifier parsing errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdentifierError {
    /// Empty identifier expression
    #[error("identifier set cannot be empty")]
    Empty,

    /// Not a non-negative integer
    #[error("invalid identifier: '{0}'")]
    InvalidId(String),

    /// Structural problem in the expression
    #[error("invalid identifier format: {0}")]
    InvalidFormat(String),

    /// Range end before range start
    #[error("range end {end} is before start {start}")]
    ReversedRange {
        /// Range start
        start: u64,
        /// Range end
        end: u64,
    },

    /// Expression expands to too many identifiers
    #[error("identifier set exceeds {0} identifiers")]
    TooMany(usize),
}
