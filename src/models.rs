use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constraints::Constraints;

/// A reference project from the local corpus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub name: String,
    pub description: String,
    /// Category name -> technologies, in the order the record lists them
    pub technologies_by_category: BTreeMap<String, Vec<String>>,
}

impl ProjectRecord {
    /// Every technology across all categories, category order first.
    pub fn technologies(&self) -> Vec<String> {
        self.technologies_by_category
            .values()
            .flat_map(|techs| techs.iter().cloned())
            .collect()
    }
}

/// A single technology pick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechStackItem {
    pub name: String,
    pub category: String,
    pub version: Option<String>,
    pub description: Option<String>,
}

impl TechStackItem {
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            version: None,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A project shown to the caller as supporting evidence, either from the
/// local corpus or from a repository search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarProject {
    pub name: String,
    pub description: String,
    pub technologies: Vec<String>,
    #[serde(default)]
    pub technologies_by_category: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stars: Option<u64>,
}

impl SimilarProject {
    pub fn from_record(record: &ProjectRecord, score: f32) -> Self {
        Self {
            name: record.name.clone(),
            description: record.description.clone(),
            technologies: record.technologies(),
            technologies_by_category: record.technologies_by_category.clone(),
            similarity_score: Some(score),
            url: None,
            stars: None,
        }
    }
}

/// The response returned for every successful request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub primary_tech_stack: Vec<TechStackItem>,
    pub alternatives: BTreeMap<String, Vec<TechStackItem>>,
    pub explanation: String,
    pub detailed_explanation: Option<String>,
    pub confidence_level: f32,
    pub similar_projects: Vec<SimilarProject>,
}

/// Recommendation request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecommendRequest {
    pub description: String,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub constraints: Constraints,
}

impl RecommendRequest {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }
}
