//! Route conditions.
//!
//! A route may carry any number of conditions; the route applies to a
//! message only if every condition passes. Conditions arrive from the
//! provisioning service as `(parser, condition)` string pairs and are
//! interpreted here. Anything that cannot be interpreted rejects the route.

mod error;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub use error::ConditionError;

/// Condition as delivered by the provisioning service.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    /// Name of the rule operator, see [`ParserKind`].
    #[serde(default)]
    pub parser: String,
    /// Operator argument.
    #[serde(default)]
    pub condition: String,
}

impl Condition {
    /// Build a condition from its parser name and argument.
    pub fn new(parser: impl Into<String>, condition: impl Into<String>) -> Self {
        Self {
            parser: parser.into(),
            condition: condition.into(),
        }
    }
}

/// Closed set of rule operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParserKind {
    /// Regular expression matched against the whole raw message.
    MessageRegex,
    /// `<index>|<regex>`; the index is bounds-checked against the element
    /// count but the regex is still matched against the whole raw message.
    IndexRegex,
    /// Element count strictly greater than the threshold.
    CountGreaterThan,
    /// Element count strictly less than the threshold.
    CountLessThan,
    /// Element count greater than or equal to the threshold.
    CountAtLeast,
    /// Element count less than or equal to the threshold.
    CountAtMost,
}

impl ParserKind {
    /// Provisioning name of this operator.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MessageRegex => "qlrx_msg_regex",
            Self::IndexRegex => "qlrx_idx_regex",
            Self::CountGreaterThan => "qlrx_idx_count_gt",
            Self::CountLessThan => "qlrx_idx_count_lt",
            Self::CountAtLeast => "qlrx_idx_count_gte",
            Self::CountAtMost => "qlrx_idx_count_lte",
        }
    }

    /// Look up an operator by its provisioning name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        [
            Self::MessageRegex,
            Self::IndexRegex,
            Self::CountGreaterThan,
            Self::CountLessThan,
            Self::CountAtLeast,
            Self::CountAtMost,
        ]
        .into_iter()
        .find(|kind| kind.as_str() == name)
    }
}

/// Check a single condition against a message.
///
/// Returns `Ok(false)` when the condition is well formed but does not hold.
///
/// # Errors
///
/// Returns a [`ConditionError`] when the condition cannot be interpreted.
pub fn check(raw: &str, elements: &[String], condition: &Condition) -> Result<bool, ConditionError> {
    let kind = ParserKind::from_name(&condition.parser).ok_or_else(|| {
        ConditionError::UnknownParser {
            parser: condition.parser.clone(),
        }
    })?;
    let argument = condition.condition.as_str();
    let count = i64::try_from(elements.len()).unwrap_or(i64::MAX);

    match kind {
        ParserKind::MessageRegex => Ok(compile(argument)?.is_match(raw)),
        ParserKind::IndexRegex => {
            let parts: Vec<&str> = argument.split('|').collect();
            let [index, pattern] = parts.as_slice() else {
                return Err(ConditionError::WrongPartCount {
                    condition: argument.to_owned(),
                    parts: parts.len(),
                });
            };
            let index: i64 = index.parse().map_err(|_| ConditionError::InvalidIndex {
                condition: argument.to_owned(),
            })?;
            if index > count {
                return Err(ConditionError::IndexOutOfRange { index, count });
            }
            // The pattern applies to the whole message, not the indexed element.
            Ok(compile(pattern)?.is_match(raw))
        }
        ParserKind::CountGreaterThan => Ok(count > threshold(argument)?),
        ParserKind::CountLessThan => Ok(count < threshold(argument)?),
        ParserKind::CountAtLeast => Ok(count >= threshold(argument)?),
        ParserKind::CountAtMost => Ok(count <= threshold(argument)?),
    }
}

/// Decide whether a route's conditions all hold for a message.
///
/// Evaluation stops at the first condition that fails or cannot be
/// interpreted. Malformed conditions are logged and reject the route.
pub fn evaluate(raw: &str, elements: &[String], conditions: &[Condition]) -> bool {
    conditions
        .iter()
        .all(|condition| match check(raw, elements, condition) {
            Ok(passed) => passed,
            Err(error) => {
                tracing::error!(
                    %error,
                    parser = %condition.parser,
                    condition = %condition.condition,
                    "rejecting route with malformed condition"
                );
                false
            }
        })
}

fn compile(pattern: &str) -> Result<Regex, ConditionError> {
    Regex::new(pattern).map_err(|source| ConditionError::InvalidRegex {
        pattern: pattern.to_owned(),
        source,
    })
}

fn threshold(argument: &str) -> Result<i64, ConditionError> {
    argument
        .trim()
        .parse()
        .map_err(|_| ConditionError::InvalidThreshold {
            condition: argument.to_owned(),
        })
}
