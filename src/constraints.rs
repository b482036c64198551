//! Caller-supplied technology constraints, keyed by category.
//!
//! A constraint value is either a single technology or a list of them. Every
//! value excludes candidates in its category whose name contains it
//! (case-insensitive substring match), and the first value is also the
//! required pick for that category.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstraintValue {
    One(String),
    Many(Vec<String>),
}

impl ConstraintValue {
    fn values(&self) -> Vec<&str> {
        match self {
            Self::One(v) => vec![v.as_str()],
            Self::Many(vs) => vs.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Constraints(BTreeMap<String, ConstraintValue>);

impl Constraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, category: &str, value: ConstraintValue) -> Self {
        self.0.insert(category.trim().to_lowercase(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lower-cased, non-empty constraint tokens for `category`.
    pub fn tokens_for(&self, category: &str) -> Vec<String> {
        self.lookup(category)
            .map(|v| {
                v.values()
                    .into_iter()
                    .map(|t| t.trim().to_lowercase())
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The technology the caller insists on for `category`, verbatim.
    pub fn required_for(&self, category: &str) -> Option<String> {
        self.lookup(category)?
            .values()
            .into_iter()
            .map(str::trim)
            .find(|t| !t.is_empty())
            .map(str::to_string)
    }

    /// True when `tech` contains any constraint token of `category`.
    pub fn excludes(&self, category: &str, tech: &str) -> bool {
        let tech = tech.to_lowercase();
        self.tokens_for(category)
            .iter()
            .any(|token| tech.contains(token.as_str()))
    }

    /// Categories named by the caller.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    fn lookup(&self, category: &str) -> Option<&ConstraintValue> {
        let category = category.to_lowercase();
        self.0
            .iter()
            .find(|(k, _)| k.trim().to_lowercase() == category)
            .map(|(_, v)| v)
    }
}
