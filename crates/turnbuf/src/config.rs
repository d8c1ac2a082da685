//! Buffer configuration with sensible defaults.
//!
//! [`MemoryConfig`] holds the three knobs of the token budget. The defaults
//! match a long-context chat agent: 150k nominal tokens, 60% of it usable for
//! history, and no single turn above 50k tokens.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{MemoryError, Result};

/// Default nominal token budget.
pub const DEFAULT_CAPACITY_TOKENS: usize = 150_000;

/// Default fraction of capacity usable for stored history.
pub const DEFAULT_RESERVE_FRACTION: f64 = 0.6;

/// Default hard cap on a single turn's estimated size.
pub const DEFAULT_TURN_CEILING_TOKENS: usize = 50_000;

/// Environment variable overriding [`MemoryConfig::capacity_tokens`].
pub const ENV_CAPACITY: &str = "MAX_CONTEXT_TOKENS";
/// Environment variable overriding [`MemoryConfig::reserve_fraction`].
pub const ENV_RESERVE_FRACTION: &str = "MEMORY_RESERVE_FRACTION";
/// Environment variable overriding [`MemoryConfig::per_turn_ceiling_tokens`].
pub const ENV_TURN_CEILING: &str = "MEMORY_TURN_CEILING";

/// Token budget for one [`BoundedMemory`](crate::memory::BoundedMemory).
///
/// # Example
///
/// ```
/// use turnbuf::config::MemoryConfig;
///
/// let config = MemoryConfig::default()
///     .with_capacity(1_000)
///     .with_reserve_fraction(0.6)
///     .with_turn_ceiling(500);
/// assert_eq!(config.effective_limit(), 600);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Nominal token budget.
    pub capacity_tokens: usize,
    /// Fraction of capacity usable for history, in `(0, 1]`. The remainder is
    /// headroom for the consumer's next response.
    pub reserve_fraction: f64,
    /// Hard cap on any single turn's estimated size.
    pub per_turn_ceiling_tokens: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            capacity_tokens: DEFAULT_CAPACITY_TOKENS,
            reserve_fraction: DEFAULT_RESERVE_FRACTION,
            per_turn_ceiling_tokens: DEFAULT_TURN_CEILING_TOKENS,
        }
    }
}

impl MemoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the nominal token budget.
    pub fn with_capacity(mut self, tokens: usize) -> Self {
        self.capacity_tokens = tokens;
        self
    }

    /// Override the usable fraction of capacity.
    pub fn with_reserve_fraction(mut self, fraction: f64) -> Self {
        self.reserve_fraction = fraction;
        self
    }

    /// Override the per-turn ceiling.
    pub fn with_turn_ceiling(mut self, tokens: usize) -> Self {
        self.per_turn_ceiling_tokens = tokens;
        self
    }

    /// Tokens actually available for stored history:
    /// `floor(capacity_tokens * reserve_fraction)`.
    pub fn effective_limit(&self) -> usize {
        (self.capacity_tokens as f64 * self.reserve_fraction).floor() as usize
    }

    /// Reject a reserve fraction outside `(0, 1]`.
    pub fn validate(&self) -> Result<()> {
        validate_reserve_fraction(self.reserve_fraction)
    }

    /// Defaults overridden by `MAX_CONTEXT_TOKENS`, `MEMORY_RESERVE_FRACTION`
    /// and `MEMORY_TURN_CEILING`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) but reading from an arbitrary source.
    ///
    /// Values that don't parse, or a reserve fraction outside `(0, 1]`, are
    /// logged and replaced by the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(tokens) = parse_var::<usize>(&lookup, ENV_CAPACITY) {
            config.capacity_tokens = tokens;
        }
        if let Some(fraction) = parse_var::<f64>(&lookup, ENV_RESERVE_FRACTION) {
            match validate_reserve_fraction(fraction) {
                Ok(()) => config.reserve_fraction = fraction,
                Err(e) => warn!("Ignoring {ENV_RESERVE_FRACTION}: {e}"),
            }
        }
        if let Some(tokens) = parse_var::<usize>(&lookup, ENV_TURN_CEILING) {
            config.per_turn_ceiling_tokens = tokens;
        }

        config
    }
}

/// A reserve fraction must lie in `(0, 1]`.
pub(crate) fn validate_reserve_fraction(fraction: f64) -> Result<()> {
    if fraction.is_finite() && fraction > 0.0 && fraction <= 1.0 {
        Ok(())
    } else {
        Err(MemoryError::InvalidInput(format!(
            "reserve_fraction must be in (0, 1], got {fraction}"
        )))
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {key}={raw:?}: not a valid number");
            None
        }
    }
}
