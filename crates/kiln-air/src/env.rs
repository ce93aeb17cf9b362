//! Pipeline environments.

use crate::Strategy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Key under which the backend strategy is stored.
pub const STRATEGY: &str = "strategy";

/// A value stored in an [`Environment`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl EnvValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            EnvValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            EnvValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            EnvValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for EnvValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvValue::Bool(b) => write!(f, "{}", b),
            EnvValue::Int(n) => write!(f, "{}", n),
            EnvValue::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for EnvValue {
    fn from(b: bool) -> Self {
        EnvValue::Bool(b)
    }
}

impl From<i64> for EnvValue {
    fn from(n: i64) -> Self {
        EnvValue::Int(n)
    }
}

impl From<usize> for EnvValue {
    fn from(n: usize) -> Self {
        EnvValue::Int(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl From<&str> for EnvValue {
    fn from(s: &str) -> Self {
        EnvValue::Str(s.to_string())
    }
}

impl From<String> for EnvValue {
    fn from(s: String) -> Self {
        EnvValue::Str(s)
    }
}

impl From<&Strategy> for EnvValue {
    fn from(strategy: &Strategy) -> Self {
        EnvValue::Str(strategy.as_str().to_string())
    }
}

/// Configuration threaded through the pass pipeline alongside a function.
///
/// Passes never mutate an environment in place; [`Environment::with`] returns
/// an extended copy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Environment {
    entries: BTreeMap<String, EnvValue>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// An environment seeded with `strategy`.
    pub fn for_strategy(strategy: &Strategy) -> Self {
        Self::new().with(STRATEGY, strategy)
    }

    /// A copy of this environment with `key` set to `value`.
    pub fn with(&self, key: impl Into<String>, value: impl Into<EnvValue>) -> Self {
        let mut entries = self.entries.clone();
        entries.insert(key.into(), value.into());
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&EnvValue> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// The backend strategy, if one is set.
    pub fn strategy(&self) -> Option<&str> {
        self.get(STRATEGY).and_then(EnvValue::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EnvValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_leaves_original_untouched() {
        let base = Environment::for_strategy(&Strategy::default());
        let extended = base.with("coercions", 2i64);

        assert_eq!(base.len(), 1);
        assert_eq!(extended.len(), 2);
        assert_eq!(extended.strategy(), Some("default"));
        assert_eq!(extended.get("coercions").and_then(EnvValue::as_int), Some(2));
    }

    #[test]
    fn test_json() {
        let env = Environment::for_strategy(&Strategy::from("remote-engine"))
            .with("verified", true)
            .with("coercions", 1usize);
        let json = serde_json::to_string(&env).unwrap();
        assert_eq!(
            json,
            r#"{"coercions":1,"strategy":"remote-engine","verified":true}"#
        );
        let back: Environment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, env);
    }
}
