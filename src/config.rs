use crate::error::PredicateIndexError;

/// Settings fixed for the lifetime of an index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    arity: u16,
}

impl Config {
    pub const DEFAULT_ARITY: u16 = 8;

    /// `arity` is the branching factor used to split numeric ranges; it must be at least 2.
    pub fn new(arity: u16) -> Result<Self, PredicateIndexError> {
        if arity < 2 {
            return Err(PredicateIndexError::InvalidArity(arity));
        }
        Ok(Self { arity })
    }

    pub fn arity(&self) -> u16 {
        self.arity
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            arity: Self::DEFAULT_ARITY,
        }
    }
}
