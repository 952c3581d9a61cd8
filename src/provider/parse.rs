//! Parse boundary between raw provider payloads and typed proposals
//!
//! Providers return loosely-structured JSON. This module turns it into
//! validated `Proposal` records so schema drift stays in the adapter
//! layer. Entries that reference unknown codes or fail validation are
//! dropped with a warning; a payload with no usable structure is a
//! payload error.

use super::traits::ProviderError;
use crate::catalog::NodeCatalog;
use crate::model::{Proposal, RelationType, StandardCode};
use serde_json::Value;
use tracing::warn;

/// Parse a provider payload into proposals.
///
/// Expected shape (tolerant of extra fields):
/// ```json
/// { "relations": [
///     { "source_code": "M1-NUM-01", "target_code": "M2-NUM-01",
///       "relation_type": "prerequisite", "confidence": 0.8,
///       "reasoning": "..." } ] }
/// ```
/// `strength` and `similarity_score` are accepted as confidence aliases.
pub fn parse_payload(
    provider_id: &str,
    provider_weight: f64,
    payload: &Value,
    catalog: &NodeCatalog,
) -> Result<Vec<Proposal>, ProviderError> {
    let entries = payload
        .get("relations")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            ProviderError::Payload(format!(
                "provider '{}': missing 'relations' array",
                provider_id
            ))
        })?;

    let mut proposals = Vec::with_capacity(entries.len());
    for entry in entries {
        match parse_entry(provider_id, provider_weight, entry, catalog) {
            Ok(Some(proposal)) => proposals.push(proposal),
            Ok(None) => {}
            Err(reason) => {
                warn!(provider = provider_id, %reason, "dropping malformed relation entry");
            }
        }
    }
    Ok(proposals)
}

fn parse_entry(
    provider_id: &str,
    provider_weight: f64,
    entry: &Value,
    catalog: &NodeCatalog,
) -> Result<Option<Proposal>, String> {
    let source_raw = str_field(entry, "source_code")?;
    let target_raw = str_field(entry, "target_code")?;
    let relation_raw = str_field(entry, "relation_type")?;

    let source = StandardCode::parse(source_raw).map_err(|e| e.to_string())?;
    let target = StandardCode::parse(target_raw).map_err(|e| e.to_string())?;
    let relation = RelationType::parse(relation_raw).map_err(|e| e.to_string())?;

    // Claims about standards outside the catalog are drift, not data.
    if !catalog.contains(&source) || !catalog.contains(&target) {
        warn!(
            provider = provider_id,
            source = %source,
            target = %target,
            "relation references code outside the catalog, skipping"
        );
        return Ok(None);
    }

    let confidence = confidence_field(entry)?;
    let rationale = entry
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or_default();

    Proposal::new(
        source,
        target,
        relation,
        confidence,
        rationale,
        provider_id,
        provider_weight,
    )
    .map(Some)
    .map_err(|e| e.to_string())
}

fn str_field<'a>(entry: &'a Value, name: &str) -> Result<&'a str, String> {
    entry
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("missing field '{}'", name))
}

fn confidence_field(entry: &Value) -> Result<f64, String> {
    for name in ["confidence", "strength", "similarity_score"] {
        if let Some(v) = entry.get(name).and_then(Value::as_f64) {
            return Ok(v);
        }
    }
    Err("missing confidence field".to_string())
}
