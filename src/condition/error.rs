//! Errors raised while interpreting route conditions.

use thiserror::Error;

/// A condition that could not be interpreted.
#[derive(Debug, Error)]
pub enum ConditionError {
    /// The parser name is not a known operator.
    #[error("unknown condition parser: {parser}")]
    UnknownParser {
        /// Parser name as provisioned.
        parser: String,
    },

    /// The regular expression failed to compile.
    #[error("could not compile regex {pattern:?}: {source}")]
    InvalidRegex {
        /// Pattern as provisioned.
        pattern: String,
        /// Compilation failure.
        source: regex::Error,
    },

    /// An index condition did not split into `index|regex`.
    #[error("index condition {condition:?} has {parts} parts, expected 2 (idx|regex)")]
    WrongPartCount {
        /// Condition as provisioned.
        condition: String,
        /// Number of `|`-separated parts found.
        parts: usize,
    },

    /// The index half of an index condition is not an integer.
    #[error("index in condition {condition:?} is not an integer (idx|regex)")]
    InvalidIndex {
        /// Condition as provisioned.
        condition: String,
    },

    /// The index addresses past the end of the message.
    #[error("condition index {index} is greater than the element count {count}")]
    IndexOutOfRange {
        /// Index named by the condition.
        index: i64,
        /// Elements in the message.
        count: i64,
    },

    /// A count threshold is not an integer.
    #[error("count threshold {condition:?} is not an integer")]
    InvalidThreshold {
        /// Condition as provisioned.
        condition: String,
    },
}
