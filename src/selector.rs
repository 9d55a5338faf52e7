// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Label selector language used for list filtering and cross-store correlation.
//!
//! A [`LabelSelector`] is a conjunction of [`Requirement`]s over string-keyed
//! labels. Requirements support equality and set membership, following the
//! Kubernetes label selector semantics. The dual writer only ever emits `in`
//! requirements over the synthetic origin-key label, but stores must be able to
//! evaluate any selector a caller passes through.
//!
//! # Example
//!
//! ```rust
//! use dualwrite::selector::{LabelSelector, Operator, Requirement};
//! use std::collections::BTreeMap;
//!
//! let requirement = Requirement::new("app", Operator::In, ["web", "api"]).unwrap();
//! let selector = LabelSelector::from(requirement);
//!
//! let labels = BTreeMap::from([("app".to_string(), "web".to_string())]);
//! assert!(selector.matches(&labels));
//! assert_eq!(selector.to_string(), "app in (api,web)");
//! ```

use crate::constants::{LABEL_PREFIX_MAX_LENGTH, LABEL_VALUE_MAX_LENGTH};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

/// Errors raised while building a selector requirement.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    /// The label key is not a valid qualified name
    #[error("Invalid label key '{key}': {reason}")]
    InvalidKey {
        /// Offending key
        key: String,
        /// Why it was rejected
        reason: String,
    },

    /// A label value is not valid
    #[error("Invalid value '{value}' for label key '{key}': {reason}")]
    InvalidValue {
        /// Key the value belongs to
        key: String,
        /// Offending value
        value: String,
        /// Why it was rejected
        reason: String,
    },

    /// The number of values does not fit the operator
    #[error("Operator '{operator}' on key '{key}' {reason}")]
    InvalidArity {
        /// Key of the requirement
        key: String,
        /// Operator used
        operator: Operator,
        /// Expected arity
        reason: String,
    },
}

/// Relationship between a label key and a set of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `key=value`
    Equals,
    /// `key!=value`
    NotEquals,
    /// `key in (a,b)`
    In,
    /// `key notin (a,b)`
    NotIn,
    /// `key`
    Exists,
    /// `!key`
    DoesNotExist,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Equals => "=",
            Self::NotEquals => "!=",
            Self::In => "in",
            Self::NotIn => "notin",
            Self::Exists => "exists",
            Self::DoesNotExist => "!",
        };
        f.write_str(s)
    }
}

/// A single validated selector requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    key: String,
    operator: Operator,
    values: BTreeSet<String>,
}

impl Requirement {
    /// Build a requirement, validating the key, the values, and the operator arity.
    ///
    /// Values are deduplicated and kept sorted so rendering is deterministic.
    ///
    /// # Errors
    ///
    /// Returns [`SelectorError`] when the key or a value is not a valid label
    /// string, or when the number of values does not fit the operator.
    pub fn new<I, V>(key: &str, operator: Operator, values: I) -> Result<Self, SelectorError>
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        validate_key(key)?;

        let values: BTreeSet<String> = values.into_iter().map(Into::into).collect();

        match operator {
            Operator::In | Operator::NotIn if values.is_empty() => {
                return Err(SelectorError::InvalidArity {
                    key: key.to_string(),
                    operator,
                    reason: "requires at least one value".to_string(),
                });
            }
            Operator::Equals | Operator::NotEquals if values.len() != 1 => {
                return Err(SelectorError::InvalidArity {
                    key: key.to_string(),
                    operator,
                    reason: "requires exactly one value".to_string(),
                });
            }
            Operator::Exists | Operator::DoesNotExist if !values.is_empty() => {
                return Err(SelectorError::InvalidArity {
                    key: key.to_string(),
                    operator,
                    reason: "takes no values".to_string(),
                });
            }
            _ => {}
        }

        for value in &values {
            validate_value(key, value)?;
        }

        Ok(Self {
            key: key.to_string(),
            operator,
            values,
        })
    }

    /// The label key this requirement applies to.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The operator.
    #[must_use]
    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// The sorted, deduplicated values.
    #[must_use]
    pub fn values(&self) -> &BTreeSet<String> {
        &self.values
    }

    /// Evaluate the requirement against a label set.
    #[must_use]
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let value = labels.get(&self.key);
        match self.operator {
            Operator::Equals | Operator::In => value.is_some_and(|v| self.values.contains(v)),
            Operator::NotEquals | Operator::NotIn => value.is_none_or(|v| !self.values.contains(v)),
            Operator::Exists => value.is_some(),
            Operator::DoesNotExist => value.is_none(),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = || self.values.iter().cloned().collect::<Vec<_>>().join(",");
        match self.operator {
            Operator::Equals => write!(f, "{}={}", self.key, joined()),
            Operator::NotEquals => write!(f, "{}!={}", self.key, joined()),
            Operator::In => write!(f, "{} in ({})", self.key, joined()),
            Operator::NotIn => write!(f, "{} notin ({})", self.key, joined()),
            Operator::Exists => write!(f, "{}", self.key),
            Operator::DoesNotExist => write!(f, "!{}", self.key),
        }
    }
}

/// A conjunction of requirements. The empty selector matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    requirements: Vec<Requirement>,
}

impl LabelSelector {
    /// A selector with no requirements.
    #[must_use]
    pub fn everything() -> Self {
        Self::default()
    }

    /// Add a requirement, returning the extended selector.
    #[must_use]
    pub fn add(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// The requirements in insertion order.
    #[must_use]
    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// True when the selector has no requirements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// True when every requirement matches the label set.
    #[must_use]
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

impl From<Requirement> for LabelSelector {
    fn from(requirement: Requirement) -> Self {
        Self {
            requirements: vec![requirement],
        }
    }
}

impl FromIterator<Requirement> for LabelSelector {
    fn from_iter<T: IntoIterator<Item = Requirement>>(iter: T) -> Self {
        Self {
            requirements: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.requirements.iter().map(ToString::to_string).collect();
        f.write_str(&rendered.join(","))
    }
}

fn validate_key(key: &str) -> Result<(), SelectorError> {
    let invalid = |reason: &str| SelectorError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    let (prefix, name) = match key.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };

    if let Some(prefix) = prefix {
        if prefix.is_empty() || prefix.len() > LABEL_PREFIX_MAX_LENGTH {
            return Err(invalid("prefix must be a non-empty DNS subdomain"));
        }
        let valid_prefix = prefix.split('.').all(|part| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
                && !part.starts_with('-')
                && !part.ends_with('-')
        });
        if !valid_prefix {
            return Err(invalid("prefix must be a lowercase DNS subdomain"));
        }
    }

    if name.is_empty() {
        return Err(invalid("name segment must not be empty"));
    }
    if name.len() > LABEL_VALUE_MAX_LENGTH {
        return Err(invalid("name segment must be at most 63 characters"));
    }
    if !is_label_string(name) {
        return Err(invalid(
            "name segment must be alphanumeric with '-', '_' or '.' in between",
        ));
    }
    Ok(())
}

fn validate_value(key: &str, value: &str) -> Result<(), SelectorError> {
    if value.is_empty() {
        return Ok(());
    }
    let invalid = |reason: &str| SelectorError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    };
    if value.len() > LABEL_VALUE_MAX_LENGTH {
        return Err(invalid("must be at most 63 characters"));
    }
    if !is_label_string(value) {
        return Err(invalid(
            "must be alphanumeric with '-', '_' or '.' in between",
        ));
    }
    Ok(())
}

fn is_label_string(s: &str) -> bool {
    let bytes = s.as_bytes();
    let (Some(first), Some(last)) = (bytes.first(), bytes.last()) else {
        return false;
    };
    first.is_ascii_alphanumeric()
        && last.is_ascii_alphanumeric()
        && bytes
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

#[cfg(test)]
#[path = "selector_tests.rs"]
mod selector_tests;
