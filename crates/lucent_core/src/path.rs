//! Layer path parsing and validation.
//!
//! A layer path names a subcomponent of a model using dot-separated segments,
//! each of which is either an attribute-style name (`conv1`, `layer4`) or an
//! integer index into a sequential container (`features.3`). Paths are parsed
//! once into a typed segment list instead of resolved reflectively at use
//! sites.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ExplainError, Result};

/// One segment of a layer path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathSegment {
    /// Attribute-style access (`conv1`).
    Name(String),
    /// Integer index into a sequential container (`3` in `features.3`).
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Name(name) => write!(f, "{name}"),
            PathSegment::Index(idx) => write!(f, "{idx}"),
        }
    }
}

/// A validated, parsed layer path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerPath {
    segments: Vec<PathSegment>,
}

impl LayerPath {
    /// Parse a dotted path string into segments.
    ///
    /// Segments consisting only of digits become [`PathSegment::Index`];
    /// anything else must be a valid identifier (alphanumeric or underscore,
    /// not starting with a digit).
    pub fn parse(path: &str) -> Result<Self> {
        if path.is_empty() {
            return Err(ExplainError::LayerResolution(
                "empty layer path".to_string(),
            ));
        }

        let mut segments = Vec::new();
        for part in path.split('.') {
            if part.is_empty() {
                return Err(ExplainError::LayerResolution(format!(
                    "empty segment in layer path '{path}'"
                )));
            }
            if part.chars().all(|c| c.is_ascii_digit()) {
                let idx: usize = part.parse().map_err(|_| {
                    ExplainError::LayerResolution(format!(
                        "index segment '{part}' out of range in '{path}'"
                    ))
                })?;
                segments.push(PathSegment::Index(idx));
            } else if part
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
                && !part.starts_with(|c: char| c.is_ascii_digit())
            {
                segments.push(PathSegment::Name(part.to_string()));
            } else {
                return Err(ExplainError::LayerResolution(format!(
                    "invalid segment '{part}' in layer path '{path}'"
                )));
            }
        }

        Ok(Self { segments })
    }

    /// The parsed segments.
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Canonical dotted string form.
    pub fn canonical(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for LayerPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

/// Parse a list of path strings, de-duplicating while preserving order.
pub fn parse_unique(paths: &[String]) -> Result<Vec<LayerPath>> {
    let mut seen = std::collections::HashSet::new();
    let mut parsed = Vec::new();
    for raw in paths {
        let path = LayerPath::parse(raw)?;
        if seen.insert(path.canonical()) {
            parsed.push(path);
        }
    }
    Ok(parsed)
}
