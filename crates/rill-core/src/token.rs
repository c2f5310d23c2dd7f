//! Generation tokens for cooperative cancellation of calculation rounds.
//!
//! Each calculated property owns one [`TokenGenerator`]. Starting a round mints
//! a fresh [`CalculationToken`], which implicitly invalidates every token minted
//! before it. A completing round publishes only if its token is still current.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque generation marker for one calculation round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CalculationToken(u64);

impl CalculationToken {
    /// The generation before any round has been started.
    pub const INITIAL: CalculationToken = CalculationToken(0);

    /// Raw generation number, useful for log fields.
    pub fn value(self) -> u64 {
        self.0
    }

    /// True if this token was minted after `other`.
    pub fn is_newer_than(self, other: CalculationToken) -> bool {
        self.0 > other.0
    }
}

impl fmt::Display for CalculationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "round#{}", self.0)
    }
}

/// Single-writer generation counter.
///
/// Only the owning coordinator advances it; any thread may compare against it.
#[derive(Debug, Default)]
pub struct TokenGenerator {
    current: AtomicU64,
}

impl TokenGenerator {
    /// Create a generator at [`CalculationToken::INITIAL`].
    pub fn new() -> Self {
        Self {
            current: AtomicU64::new(0),
        }
    }

    /// Mint the next token, invalidating all earlier ones.
    pub fn advance(&self) -> CalculationToken {
        CalculationToken(self.current.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// The most recently minted token.
    pub fn current(&self) -> CalculationToken {
        CalculationToken(self.current.load(Ordering::Acquire))
    }

    /// True if `token` is the most recently minted token.
    pub fn is_current(&self, token: CalculationToken) -> bool {
        self.current() == token
    }
}
