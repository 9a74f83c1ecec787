//! Runtime configuration
//!
//! Two layers:
//! - `Config`: process settings read from the environment (`.env` honored)
//! - `ImportRules`: vocabulary and heuristics, built in by default and
//!   optionally overridden by a JSON rules file

use crate::error::ConfigError;
use crate::header::HeaderStrategy;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone)]
pub struct Config {
    pub db_url: Option<String>,
    pub workers: usize,
    pub max_connections: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            db_url: std::env::var("DB_URL").ok(),
            workers: parse_env("IMPORT_WORKERS", DEFAULT_WORKERS)?,
            max_connections: parse_env("DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
        })
    }
}

fn parse_env<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Env { name, value }),
        Err(_) => Ok(default),
    }
}

// =============================================================================
// Import rules
// =============================================================================

/// Ordered pattern tables consumed by the row classifier
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierRules {
    /// Regexes matched case-insensitively against the start of a cell
    pub program_patterns: Vec<String>,
    /// Closed vocabulary; a cell must equal one of these
    pub category_tokens: Vec<String>,
    /// Substrings that mark a seat-quota header
    pub quota_markers: Vec<String>,
}

impl Default for ClassifierRules {
    fn default() -> Self {
        let program_patterns = [
            r"^M\.?\s?D\.?(\s|\(|-|,|$)",
            r"^M\.?\s?S\.?(\s|\(|-|,|$)",
            r"^D\.?\s?M\.?(\s|\(|-|,|$)",
            r"^M\.?\s?CH\.?(\s|\(|-|,|$)",
            r"^MDS(\s|\(|-|,|$)",
            r"^MBBS(\s|\(|-|,|$)",
            r"^BDS(\s|\(|-|,|$)",
            r"^DR?NB(\s|\(|-|,|$)",
            r"^FNB(\s|\(|-|,|$)",
            r"^(PG\s+)?DIPLOMA(\s|\(|-|,|$)",
            r"^B\.?\s?SC\.?(\s|\(|-|,|$)",
            r"^M\.?\s?SC\.?(\s|\(|-|,|$)",
        ];
        let category_tokens = [
            "OPEN", "GENERAL", "GN", "UR", "OBC", "OBC-NCL", "SC", "ST", "EWS", "GEN-EWS",
            "BC", "MBC", "BCM", "SCA", "GM", "OPEN PWD", "GN PWD", "UR PWD", "OBC PWD", "SC PWD",
            "ST PWD", "EWS PWD", "PWD",
        ];
        let quota_markers = [
            "QUOTA",
            "SEATS",
            "ALL INDIA",
            "DEEMED",
            "MANAGEMENT",
            "NRI",
            "INSTITUTIONAL",
            "CENTRAL INSTITUTE",
            "UNIVERSITY",
            "MINORITY",
            "ESIC",
            "AFMS",
        ];
        Self {
            program_patterns: program_patterns.iter().map(|s| s.to_string()).collect(),
            category_tokens: category_tokens.iter().map(|s| s.to_string()).collect(),
            quota_markers: quota_markers.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Known corruption in label text, replaced as a whole word
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TypoRule {
    pub from: String,
    pub to: String,
}

impl TypoRule {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

pub fn default_typos() -> Vec<TypoRule> {
    vec![
        TypoRule::new("MANAGE MENT", "MANAGEMENT"),
        TypoRule::new("MANAGEMEN T", "MANAGEMENT"),
        TypoRule::new("QOUTA", "QUOTA"),
        TypoRule::new("QUOT A", "QUOTA"),
        TypoRule::new("GENRAL", "GENERAL"),
        TypoRule::new("GEN ERAL", "GENERAL"),
        TypoRule::new("INSTITUT IONAL", "INSTITUTIONAL"),
        TypoRule::new("ALLINDIA", "ALL INDIA"),
    ]
}

fn default_counselling_types() -> Vec<String> {
    ["AIQ", "MCC", "DNB", "KEA", "AACCC", "INICET", "DEEMED", "STATE"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Everything the pipeline needs to know about the vocabulary of the exports
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImportRules {
    pub classifier: ClassifierRules,
    pub typos: Vec<TypoRule>,
    pub counselling_types: Vec<String>,
    /// Keyed by counselling type (upper-case)
    pub header_strategies: HashMap<String, HeaderStrategy>,
    pub default_header_strategy: HeaderStrategy,
}

impl Default for ImportRules {
    fn default() -> Self {
        Self {
            classifier: ClassifierRules::default(),
            typos: default_typos(),
            counselling_types: default_counselling_types(),
            header_strategies: HashMap::new(),
            default_header_strategy: HeaderStrategy::default(),
        }
    }
}

impl ImportRules {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: PathBuf::from(path),
            source,
        })?;
        Self::from_json(&raw).map_err(|source| ConfigError::Parse {
            path: PathBuf::from(path),
            source,
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn header_strategy(&self, counselling_type: &str) -> &HeaderStrategy {
        self.header_strategies
            .get(&counselling_type.to_uppercase())
            .unwrap_or(&self.default_header_strategy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_rules_file_keeps_defaults() {
        let rules = ImportRules::from_json(r#"{ "counselling_types": ["XYZ"] }"#).unwrap();
        assert_eq!(rules.counselling_types, vec!["XYZ".to_string()]);
        assert_eq!(rules.typos, default_typos());
        assert!(!rules.classifier.category_tokens.is_empty());
    }

    #[test]
    fn test_header_strategy_lookup_by_counselling_type() {
        let rules = ImportRules::from_json(
            r#"{ "header_strategies": { "DNB": { "kind": "whole_cell" } } }"#,
        )
        .unwrap();
        assert_eq!(rules.header_strategy("dnb"), &HeaderStrategy::WholeCell);
        assert_eq!(rules.header_strategy("AIQ"), &HeaderStrategy::default());
    }

    #[test]
    fn test_misspelled_rules_key_falls_back_to_default() {
        let rules = ImportRules::from_json(r#"{ "counseling_types": ["X"] }"#).unwrap();
        assert_eq!(rules.counselling_types, default_counselling_types());
    }
}
