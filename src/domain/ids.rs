// Copyright (c) 2025 - Cowboy AI, Inc.
//! Logical Identifiers
//!
//! Every declared resource is named by a caller-assigned logical ID that stays
//! stable across plan, apply and destroy cycles.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Logical ID validation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LogicalIdError {
    #[error("Logical ID cannot be empty")]
    Empty,

    #[error("Logical ID too long ({0} chars, max {max})", max = LogicalId::MAX_LEN)]
    TooLong(usize),

    #[error("Logical ID contains whitespace: {0:?}")]
    Whitespace(String),
}

/// Stable, caller-assigned resource name
///
/// Invariants:
/// - Not empty
/// - At most 255 characters
/// - No whitespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LogicalId(String);

impl LogicalId {
    pub const MAX_LEN: usize = 255;

    pub fn new(id: impl Into<String>) -> Result<Self, LogicalIdError> {
        let id = id.into();
        if id.is_empty() {
            return Err(LogicalIdError::Empty);
        }
        if id.len() > Self::MAX_LEN {
            return Err(LogicalIdError::TooLong(id.len()));
        }
        if id.chars().any(char::is_whitespace) {
            return Err(LogicalIdError::Whitespace(id));
        }
        Ok(Self(id))
    }

    /// Derive a child ID such as `<subnet>:rtb`
    ///
    /// The suffix is trusted; callers only pass fixed, whitespace-free tokens.
    pub(crate) fn derive(&self, suffix: &str) -> Self {
        Self(format!("{}:{}", self.0, suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LogicalId {
    type Err = LogicalIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for LogicalId {
    type Error = LogicalIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<LogicalId> for String {
    fn from(id: LogicalId) -> Self {
        id.0
    }
}

impl AsRef<str> for LogicalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_logical_id() {
        let id = LogicalId::new("public_subnet_1").unwrap();
        assert_eq!(id.as_str(), "public_subnet_1");
        assert_eq!(id.to_string(), "public_subnet_1");
    }

    #[test]
    fn test_invalid_logical_ids() {
        assert_eq!(LogicalId::new(""), Err(LogicalIdError::Empty));
        assert!(matches!(
            LogicalId::new("has space"),
            Err(LogicalIdError::Whitespace(_))
        ));
        assert!(matches!(
            LogicalId::new("x".repeat(256)),
            Err(LogicalIdError::TooLong(256))
        ));
    }

    #[test]
    fn test_derived_id() {
        let subnet = LogicalId::new("private_subnet_1").unwrap();
        assert_eq!(subnet.derive("rtb").as_str(), "private_subnet_1:rtb");
    }
}
