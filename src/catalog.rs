//! Node catalog — the fixed set of standards the pipeline operates on
//!
//! Supplied by the external extraction layer as a flat record sequence.
//! Validated once at construction; read-only afterwards.

use crate::model::{GradeBand, SchemaError, Standard, StandardCode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// One raw catalog record as handed over by the extraction layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub code: String,
    pub grade_band: u8,
    pub domain: String,
    #[serde(default)]
    pub content_group: Option<String>,
    pub ordinal: u32,
}

/// The validated, immutable set of standards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeCatalog {
    standards: Vec<Standard>,
    #[serde(skip)]
    by_code: HashMap<StandardCode, usize>,
}

impl NodeCatalog {
    /// Build a catalog from raw records. Fails fast on a malformed or
    /// duplicate code.
    pub fn from_records(records: Vec<CatalogRecord>) -> Result<Self, SchemaError> {
        let mut standards = Vec::with_capacity(records.len());
        let mut seen: HashSet<StandardCode> = HashSet::with_capacity(records.len());

        for record in records {
            let code = StandardCode::parse(&record.code)?;
            if !seen.insert(code.clone()) {
                return Err(SchemaError::DuplicateCode(record.code));
            }
            standards.push(Standard::new(
                code,
                GradeBand(record.grade_band),
                record.domain,
                record.content_group,
                record.ordinal,
            ));
        }

        Ok(Self::from_standards_unchecked(standards))
    }

    /// Build from already-validated standards (fixtures, deserialization).
    pub fn from_standards(standards: Vec<Standard>) -> Result<Self, SchemaError> {
        let mut seen: HashSet<&StandardCode> = HashSet::with_capacity(standards.len());
        for standard in &standards {
            if !seen.insert(&standard.code) {
                return Err(SchemaError::DuplicateCode(standard.code.to_string()));
            }
        }
        Ok(Self::from_standards_unchecked(standards))
    }

    fn from_standards_unchecked(standards: Vec<Standard>) -> Self {
        let by_code = standards
            .iter()
            .enumerate()
            .map(|(i, s)| (s.code.clone(), i))
            .collect();
        Self { standards, by_code }
    }

    pub fn len(&self) -> usize {
        self.standards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.standards.is_empty()
    }

    pub fn get(&self, code: &StandardCode) -> Option<&Standard> {
        self.by_code.get(code).map(|&i| &self.standards[i])
    }

    pub fn contains(&self, code: &StandardCode) -> bool {
        self.by_code.contains_key(code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Standard> {
        self.standards.iter()
    }

    pub fn codes(&self) -> impl Iterator<Item = &StandardCode> {
        self.standards.iter().map(|s| &s.code)
    }

    /// Standards grouped by (grade band, domain, content group), ordinal-sorted
    /// within each group. Groups without a content group are excluded — the
    /// adjacency rule needs the finer grouping to be meaningful.
    pub fn adjacency_groups(&self) -> BTreeMap<(GradeBand, &str, &str), Vec<&Standard>> {
        let mut groups: BTreeMap<(GradeBand, &str, &str), Vec<&Standard>> = BTreeMap::new();
        for standard in &self.standards {
            if let Some(group) = standard.content_group.as_deref() {
                groups
                    .entry((standard.grade_band, standard.domain.as_str(), group))
                    .or_default()
                    .push(standard);
            }
        }
        for members in groups.values_mut() {
            members.sort_by_key(|s| s.ordinal);
        }
        groups
    }

    /// Standards grouped by (domain, content group) across all grade bands,
    /// sorted by (grade band, ordinal).
    pub fn progression_groups(&self) -> BTreeMap<(&str, &str), Vec<&Standard>> {
        let mut groups: BTreeMap<(&str, &str), Vec<&Standard>> = BTreeMap::new();
        for standard in &self.standards {
            if let Some(group) = standard.content_group.as_deref() {
                groups
                    .entry((standard.domain.as_str(), group))
                    .or_default()
                    .push(standard);
            }
        }
        for members in groups.values_mut() {
            members.sort_by_key(|s| (s.grade_band, s.ordinal));
        }
        groups
    }

    /// Rebuild the code index after deserialization.
    pub fn reindex(&mut self) {
        self.by_code = self
            .standards
            .iter()
            .enumerate()
            .map(|(i, s)| (s.code.clone(), i))
            .collect();
    }
}
