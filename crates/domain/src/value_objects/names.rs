//! Validated text newtypes for rules
//!
//! Lengths are counted in characters, not bytes: rule names are routinely
//! written in CJK scripts where one character is three UTF-8 bytes.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DomainError;

/// Maximum length for a rule name
const MAX_RULE_NAME_LENGTH: usize = 50;

/// Maximum length for a rule description
const MAX_RULE_DESCRIPTION_LENGTH: usize = 500;

fn validated(
    value: String,
    field: &str,
    max_chars: usize,
) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    if trimmed.chars().count() > max_chars {
        return Err(DomainError::validation(format!(
            "{field} cannot exceed {max_chars} characters"
        )));
    }
    Ok(trimmed.to_string())
}

// ============================================================================
// RuleName
// ============================================================================

/// A validated rule name (non-empty, <=50 chars, trimmed)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RuleName(String);

impl RuleName {
    /// Create a new validated rule name.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the trimmed name is empty or longer
    /// than 50 characters.
    pub fn new(name: impl Into<String>) -> Result<Self, DomainError> {
        validated(name.into(), "Rule name", MAX_RULE_NAME_LENGTH).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for RuleName {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RuleName> for String {
    fn from(name: RuleName) -> String {
        name.0
    }
}

// ============================================================================
// RuleDescription
// ============================================================================

/// A validated rule description (non-empty, <=500 chars, trimmed)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RuleDescription(String);

impl RuleDescription {
    pub fn new(description: impl Into<String>) -> Result<Self, DomainError> {
        validated(
            description.into(),
            "Rule description",
            MAX_RULE_DESCRIPTION_LENGTH,
        )
        .map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuleDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for RuleDescription {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RuleDescription> for String {
    fn from(description: RuleDescription) -> String {
        description.0
    }
}
