use crate::error::{BrokerError, Result};
use crate::types::Labels;
use std::str::FromStr;

/// A parsed equality label selector, e.g. `board=j784s4evm,enabled=true`.
///
/// Every clause must hold for a label set to match. The empty selector
/// matches everything.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selector {
    raw: String,
    clauses: Vec<(String, String)>,
}

impl Selector {
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self {
                raw: raw.to_string(),
                clauses: Vec::new(),
            });
        }

        let mut clauses = Vec::new();
        for clause in raw.split(',') {
            let clause = clause.trim();
            let Some((key, value)) = clause.split_once('=') else {
                return Err(invalid(raw, format!("clause '{}' is missing '='", clause)));
            };
            let key = key.trim();
            if key.is_empty() {
                return Err(invalid(raw, format!("clause '{}' has an empty key", clause)));
            }
            clauses.push((key.to_string(), value.trim().to_string()));
        }

        Ok(Self {
            raw: raw.to_string(),
            clauses,
        })
    }

    /// Selector that matches every label set.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// The selector text exactly as it was supplied.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn clauses(&self) -> impl Iterator<Item = (&str, &str)> {
        self.clauses.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Case-sensitive exact equality on every clause.
    pub fn matches(&self, labels: &Labels) -> bool {
        self.clauses
            .iter()
            .all(|(key, value)| labels.get(key).is_some_and(|v| v == value))
    }
}

impl FromStr for Selector {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Parses `selector` and evaluates it against `labels` in one step.
pub fn matches(selector: &str, labels: &Labels) -> Result<bool> {
    Ok(Selector::parse(selector)?.matches(labels))
}

fn invalid(selector: &str, reason: String) -> BrokerError {
    BrokerError::InvalidSelector {
        selector: selector.to_string(),
        reason,
    }
}
