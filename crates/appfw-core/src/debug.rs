//! Framework debug filter patterns.
//!
//! Pattern grammar:
//! - `*` enables all tracing
//! - `@name` enables tracing in one source unit
//! - `name` enables tracing of one named operation
//!
//! Filters are global to the framework session of this process.

use serde::{Deserialize, Serialize};

use crate::error::{AppFwError, Result};

/// One parsed debug filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum DebugPattern {
    All,
    Unit(String),
    Operation(String),
}

impl DebugPattern {
    pub fn parse(pattern: &str) -> Result<Self> {
        let pattern = pattern.trim();
        match pattern {
            "" => Err(AppFwError::invalid_argument(
                "debug",
                "Debug string cannot be empty",
            )),
            "*" => Ok(DebugPattern::All),
            _ => match pattern.strip_prefix('@') {
                Some("") => Err(AppFwError::invalid_argument(
                    "debug",
                    "Source unit name missing after '@'",
                )),
                Some(unit) => Ok(DebugPattern::Unit(unit.to_string())),
                None => Ok(DebugPattern::Operation(pattern.to_string())),
            },
        }
    }

    /// Parse a whole list, failing on the first invalid entry.
    pub fn parse_all<I, S>(patterns: I) -> Result<Vec<Self>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        patterns
            .into_iter()
            .map(|pattern| Self::parse(pattern.as_ref()))
            .collect()
    }
}

impl std::fmt::Display for DebugPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DebugPattern::All => write!(f, "*"),
            DebugPattern::Unit(unit) => write!(f, "@{}", unit),
            DebugPattern::Operation(op) => write!(f, "{}", op),
        }
    }
}

impl From<DebugPattern> for String {
    fn from(pattern: DebugPattern) -> Self {
        pattern.to_string()
    }
}

impl TryFrom<String> for DebugPattern {
    type Error = AppFwError;

    fn try_from(value: String) -> Result<Self> {
        DebugPattern::parse(&value)
    }
}
