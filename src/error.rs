/// Configuration errors raised while resolving a rule.
///
/// None of these abort a tick: the engine logs the error, skips the offending
/// rule and keeps evaluating the rest of the list. Transient query failures
/// (vanished creatures, missing tiles) are not errors at all; they read as
/// "no match".
use crate::patterns::PatternCategory;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("no {category:?} pattern at index {index}")]
    UnknownPattern { category: PatternCategory, index: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error("hp window [{min}, {max}] is empty or exceeds 100")]
    InvalidHpWindow { min: u8, max: u8 },
}
