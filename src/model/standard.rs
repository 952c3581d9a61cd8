//! Curriculum standard — the immutable node type of the graph

use super::SchemaError;
use serde::{Deserialize, Serialize};

/// Unique identifier for a curriculum standard.
///
/// Codes are one or more `[A-Z0-9]` segments joined by `-` or `.`,
/// with at least two segments (e.g. `2수01-03`, normalized upstream to
/// `M2-NUM-03` style codes before they reach the catalog).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StandardCode(String);

impl StandardCode {
    /// Parse and validate a code string.
    pub fn parse(raw: &str) -> Result<Self, SchemaError> {
        if !Self::is_valid(raw) {
            return Err(SchemaError::InvalidCode(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    fn is_valid(raw: &str) -> bool {
        let segments: Vec<&str> = raw.split(['-', '.']).collect();
        if segments.len() < 2 {
            return false;
        }
        segments.iter().all(|seg| {
            !seg.is_empty()
                && seg
                    .chars()
                    .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StandardCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ordered grade band (e.g. 1 = grades 1-2, 2 = grades 3-4).
///
/// Bands compare by rank; the gap between two bands drives the
/// precedence-rule confidence.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GradeBand(pub u8);

impl GradeBand {
    /// Absolute distance between two bands.
    pub fn gap(&self, other: &GradeBand) -> u8 {
        self.0.abs_diff(other.0)
    }
}

impl std::fmt::Display for GradeBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "band-{}", self.0)
    }
}

/// A curriculum standard. Created once from the catalog input and never
/// mutated by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standard {
    /// Unique, pattern-validated code
    pub code: StandardCode,
    /// Grade band this standard belongs to
    pub grade_band: GradeBand,
    /// Content domain (e.g. "number", "geometry")
    pub domain: String,
    /// Finer content grouping within the domain, when known
    pub content_group: Option<String>,
    /// Position within (domain, grade band)
    pub ordinal: u32,
}

impl Standard {
    pub fn new(
        code: StandardCode,
        grade_band: GradeBand,
        domain: impl Into<String>,
        content_group: Option<String>,
        ordinal: u32,
    ) -> Self {
        Self {
            code,
            grade_band,
            domain: domain.into(),
            content_group,
            ordinal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_codes_parse() {
        assert!(StandardCode::parse("M2-NUM-03").is_ok());
        assert!(StandardCode::parse("ALG.1").is_ok());
        assert!(StandardCode::parse("9-12.G.4").is_ok());
    }

    #[test]
    fn invalid_codes_rejected() {
        assert!(StandardCode::parse("").is_err());
        assert!(StandardCode::parse("single").is_err());
        assert!(StandardCode::parse("M2").is_err());
        assert!(StandardCode::parse("m2-num").is_err()); // lowercase
        assert!(StandardCode::parse("M2--03").is_err()); // empty segment
        assert!(StandardCode::parse("M2-NUM 03").is_err()); // space
    }

    #[test]
    fn grade_band_gap() {
        assert_eq!(GradeBand(1).gap(&GradeBand(3)), 2);
        assert_eq!(GradeBand(3).gap(&GradeBand(1)), 2);
        assert_eq!(GradeBand(2).gap(&GradeBand(2)), 0);
    }
}
