//! Row Classifier - decides what a normalized cell means
//!
//! Rule-sets are evaluated in a fixed order so ambiguous tokens resolve the
//! same way every time: Program, Category, Quota, Rank. Anything else is
//! Unknown. Some quota-scheme labels look like categories or contain degree
//! names, so Program and Category win over Quota.

use crate::config::ClassifierRules;
use crate::error::ConfigError;
use regex::{RegexSet, RegexSetBuilder};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowKind {
    Program,
    Category,
    Quota,
    Rank,
    Unknown,
}

/// Value carried by a classified row
#[derive(Debug, Clone, PartialEq)]
pub enum RowValue {
    Text(String),
    /// Native numeric spreadsheet cell
    Number(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedRow {
    pub kind: RowKind,
    pub value: RowValue,
    pub row: usize,
}

impl ClassifiedRow {
    pub fn text(&self) -> Option<&str> {
        match &self.value {
            RowValue::Text(text) => Some(text),
            RowValue::Number(_) => None,
        }
    }

    /// Rank as a non-negative integer, `None` if it does not fit
    pub fn rank(&self) -> Option<u32> {
        match &self.value {
            RowValue::Text(text) => text.parse().ok(),
            RowValue::Number(n) => {
                if n.is_finite() && *n >= 0.0 && n.fract() == 0.0 && *n <= u32::MAX as f64 {
                    Some(*n as u32)
                } else {
                    None
                }
            }
        }
    }
}

#[derive(Debug)]
pub struct RowClassifier {
    programs: RegexSet,
    categories: HashSet<String>,
    quota_markers: Vec<String>,
}

impl RowClassifier {
    pub fn new(rules: &ClassifierRules) -> Result<Self, ConfigError> {
        let programs = RegexSetBuilder::new(&rules.program_patterns)
            .case_insensitive(true)
            .build()
            .map_err(|source| ConfigError::Pattern {
                pattern: rules.program_patterns.join(" | "),
                source,
            })?;

        Ok(Self {
            programs,
            categories: rules.category_tokens.iter().map(|t| canonical(t)).collect(),
            quota_markers: rules.quota_markers.iter().map(|m| canonical(m)).collect(),
        })
    }

    /// Total: every string maps to exactly one kind
    pub fn classify(&self, text: &str) -> RowKind {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return RowKind::Unknown;
        }

        if self.programs.is_match(trimmed) {
            return RowKind::Program;
        }

        let label = canonical(trimmed);
        if self.categories.contains(&label) {
            return RowKind::Category;
        }
        if self.quota_markers.iter().any(|m| label.contains(m.as_str())) {
            return RowKind::Quota;
        }

        if trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return RowKind::Rank;
        }

        RowKind::Unknown
    }

    /// Category and quota labels carry their canonical form, so spacing and
    /// case differences between exports map to the same natural key
    pub fn classify_text(&self, text: String, row: usize) -> ClassifiedRow {
        let kind = self.classify(&text);
        let value = match kind {
            RowKind::Category | RowKind::Quota => canonical(&text),
            _ => text.trim().to_string(),
        };
        ClassifiedRow {
            kind,
            value: RowValue::Text(value),
            row,
        }
    }

    /// Numeric cells can only ever be ranks
    pub fn classify_number(&self, value: f64, row: usize) -> ClassifiedRow {
        ClassifiedRow {
            kind: RowKind::Rank,
            value: RowValue::Number(value),
            row,
        }
    }
}

/// Upper-case, single-spaced form used for vocabulary lookups
fn canonical(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}
