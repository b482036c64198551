//! Local, deterministic stack aggregation by frequency voting.
//!
//! Used when no LLM provider produced a recommendation. For every category in
//! the [`TechCatalog`] the technologies listed by the similar projects are
//! tallied (case-insensitively), constrained-out tokens are dropped, and the
//! most frequent one wins. Caller-required technologies override the vote.

use std::collections::{BTreeMap, HashMap};

use crate::catalog::TechCatalog;
use crate::constraints::Constraints;
use crate::models::{SimilarProject, TechStackItem};

/// Maximum alternatives listed per category.
const MAX_ALTERNATIVES: usize = 3;
/// Project count at which the project factor saturates.
const PROJECT_SATURATION: f64 = 5.0;
/// Occurrence count at which the usage factor saturates.
const USAGE_SATURATION: f64 = 10.0;
const PROJECT_WEIGHT: f64 = 0.6;
const USAGE_WEIGHT: f64 = 0.4;

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub primary_stack: Vec<TechStackItem>,
    pub alternatives: BTreeMap<String, Vec<TechStackItem>>,
    pub confidence: f32,
    pub explanation: String,
    pub detailed_explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Tally {
    tech: String,
    count: usize,
}

/// Aggregate a stack from `projects`.
///
/// Returns an empty stack with zero confidence when `projects` is empty.
pub fn aggregate(
    catalog: &TechCatalog,
    projects: &[SimilarProject],
    constraints: &Constraints,
) -> Aggregation {
    if projects.is_empty() {
        return Aggregation {
            primary_stack: Vec::new(),
            alternatives: BTreeMap::new(),
            confidence: 0.0,
            explanation: "No similar projects were found, so no stack could be recommended."
                .to_string(),
            detailed_explanation: "We have low confidence in this result (confidence score: 0.00)."
                .to_string(),
        };
    }

    let mut primary_stack = Vec::new();
    let mut alternatives = BTreeMap::new();
    let mut top_count = 0usize;

    for category in catalog.categories() {
        let tallies = tally_category(projects, category, constraints);
        if let Some(first) = tallies.first() {
            top_count = top_count.max(first.count);
        }

        let (pick, rest) = match constraints.required_for(category) {
            Some(required) => (
                Some(
                    TechStackItem::new(required, category)
                        .with_description("Required by project constraints"),
                ),
                tallies.as_slice(),
            ),
            None => match tallies.split_first() {
                Some((first, rest)) => (
                    Some(TechStackItem::new(&first.tech, category).with_description(format!(
                        "Most common {category} choice, {}",
                        usage_note(first.count)
                    ))),
                    rest,
                ),
                None => (None, &[][..]),
            },
        };

        let Some(pick) = pick else {
            continue;
        };
        primary_stack.push(pick);

        let alts: Vec<TechStackItem> = rest
            .iter()
            .take(MAX_ALTERNATIVES)
            .map(|t| TechStackItem::new(&t.tech, category).with_description(usage_note(t.count)))
            .collect();
        if !alts.is_empty() {
            alternatives.insert(category.to_string(), alts);
        }
    }

    let confidence = confidence(projects.len(), top_count);
    let explanation = explain(projects.len(), &primary_stack, confidence);
    let detailed_explanation = explain_in_detail(projects, &primary_stack, &alternatives, confidence);

    tracing::debug!(
        projects = projects.len(),
        top_count,
        confidence,
        "aggregated local stack"
    );

    Aggregation {
        primary_stack,
        alternatives,
        confidence,
        explanation,
        detailed_explanation,
    }
}

/// Count technologies of one category, most frequent first. Ties keep the
/// order in which the technologies were first seen.
fn tally_category(
    projects: &[SimilarProject],
    category: &str,
    constraints: &Constraints,
) -> Vec<Tally> {
    let mut tallies: Vec<Tally> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for project in projects {
        let techs = project
            .technologies_by_category
            .iter()
            .filter(|(cat, _)| cat.eq_ignore_ascii_case(category))
            .flat_map(|(_, techs)| techs.iter());

        for tech in techs {
            let tech = tech.trim().to_lowercase();
            if tech.is_empty() || constraints.excludes(category, &tech) {
                continue;
            }
            match positions.get(&tech) {
                Some(&i) => tallies[i].count += 1,
                None => {
                    positions.insert(tech.clone(), tallies.len());
                    tallies.push(Tally { tech, count: 1 });
                }
            }
        }
    }

    // stable: equal counts stay in first-seen order
    tallies.sort_by(|a, b| b.count.cmp(&a.count));
    tallies
}

/// Weighted confidence, rounded to two decimals and clamped to [0, 1].
pub fn confidence(project_count: usize, top_count: usize) -> f32 {
    if project_count == 0 {
        return 0.0;
    }
    let project_factor = (project_count as f64 / PROJECT_SATURATION).min(1.0) * PROJECT_WEIGHT;
    let usage_factor = (top_count as f64 / USAGE_SATURATION).min(1.0) * USAGE_WEIGHT;
    let rounded = ((project_factor + usage_factor) * 100.0).round() / 100.0;
    rounded.clamp(0.0, 1.0) as f32
}

fn usage_note(count: usize) -> String {
    let times = if count == 1 { "time" } else { "times" };
    format!("used {count} {times} across similar projects")
}

fn stack_names(stack: &[TechStackItem]) -> String {
    stack
        .iter()
        .map(|t| t.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn explain(project_count: usize, stack: &[TechStackItem], confidence: f32) -> String {
    let plural = if project_count == 1 { "" } else { "s" };
    let percent = (confidence * 100.0).round() as u32;
    if stack.is_empty() {
        format!(
            "Based on {project_count} similar project{plural}, no technology remained after \
             applying your constraints. Confidence: {percent}%."
        )
    } else {
        format!(
            "Based on {project_count} similar project{plural}, the recommended stack is {}. \
             Confidence: {percent}%.",
            stack_names(stack)
        )
    }
}

fn explain_in_detail(
    projects: &[SimilarProject],
    stack: &[TechStackItem],
    alternatives: &BTreeMap<String, Vec<TechStackItem>>,
    confidence: f32,
) -> String {
    let mut parts = Vec::new();

    if !stack.is_empty() {
        parts.push(format!(
            "We recommend using {} as your primary technology stack.",
            stack_names(stack)
        ));
    }

    if !alternatives.is_empty() {
        let alts = alternatives
            .values()
            .map(|items| stack_names(items))
            .collect::<Vec<_>>()
            .join(", ");
        parts.push(format!("Alternative technologies to consider include {alts}."));
    }

    let names: Vec<&str> = projects.iter().take(3).map(|p| p.name.as_str()).collect();
    if !names.is_empty() {
        parts.push(format!(
            "These recommendations are based on similar projects: {}.",
            names.join(", ")
        ));
    }

    let band = if confidence > 0.7 {
        "high"
    } else if confidence > 0.4 {
        "medium"
    } else {
        "low"
    };
    parts.push(format!(
        "We have {band} confidence in these recommendations (confidence score: {confidence:.2})."
    ));

    parts.join(" ")
}
