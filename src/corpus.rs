//! Loading the reference corpus from disk.
//!
//! Two file layouts are accepted: `{"tech_stacks": [...]}` and a bare list.
//! Within a record, technologies can be given per category as top-level keys
//! (`"frontend": ["react"]`), under `technologies_by_category`, or as a flat
//! `technologies` list that is sorted into categories via the catalog.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::catalog::{canonical_name, TechCatalog};
use crate::models::ProjectRecord;

#[derive(Deserialize)]
#[serde(untagged)]
enum CorpusFile {
    Wrapped { tech_stacks: Vec<RawRecord> },
    Plain(Vec<RawRecord>),
}

#[derive(Deserialize)]
struct RawRecord {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    technologies_by_category: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    technologies: Vec<String>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_json::Value>,
}

/// Read and normalise the corpus file at `path`.
pub fn load_records(path: &Path, catalog: &TechCatalog) -> Result<Vec<ProjectRecord>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read corpus file {}", path.display()))?;
    let records = parse_records(&data, catalog)
        .with_context(|| format!("Failed to parse corpus file {}", path.display()))?;
    tracing::info!("Loaded {} corpus records from {}", records.len(), path.display());
    Ok(records)
}

pub fn parse_records(data: &str, catalog: &TechCatalog) -> Result<Vec<ProjectRecord>> {
    let file: CorpusFile = serde_json::from_str(data).context("Unrecognised corpus format")?;
    let raw = match file {
        CorpusFile::Wrapped { tech_stacks } => tech_stacks,
        CorpusFile::Plain(records) => records,
    };

    Ok(raw
        .into_iter()
        .filter_map(|r| normalize_record(r, catalog))
        .collect())
}

fn normalize_record(raw: RawRecord, catalog: &TechCatalog) -> Option<ProjectRecord> {
    let name = raw.name.unwrap_or_default().trim().to_string();
    let description = raw.description.unwrap_or_default().trim().to_string();
    if name.is_empty() || description.is_empty() {
        tracing::warn!("Skipping corpus record without name or description: {name:?}");
        return None;
    }

    let mut by_category: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for (category, techs) in raw.technologies_by_category {
        let category = category.trim().to_lowercase();
        if catalog.contains_category(&category) {
            by_category.entry(category).or_default().extend(techs);
        }
    }

    for (key, value) in raw.extra {
        let category = key.trim().to_lowercase();
        if !catalog.contains_category(&category) {
            continue;
        }
        if let serde_json::Value::Array(items) = value {
            let techs = items
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string));
            by_category.entry(category).or_default().extend(techs);
        }
    }

    // The flat list is only a fallback; records that carry both usually
    // repeat the categorised entries in it.
    if by_category.values().all(Vec::is_empty) {
        for tech in &raw.technologies {
            if let Some(category) = catalog.classify(tech) {
                by_category
                    .entry(category.to_string())
                    .or_default()
                    .push(canonical_name(tech));
            }
        }
    }

    by_category.retain(|_, techs| !techs.is_empty());

    Some(ProjectRecord {
        name,
        description,
        technologies_by_category: by_category,
    })
}
