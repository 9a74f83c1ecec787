//! Column-header extraction
//!
//! Row 0 of every column names the institution, usually followed by its
//! location ("Example Medical College, City, State"). Exports differ in how
//! much of the header is the name, so the strategy is picked per counselling
//! type from the import rules.

use serde::Deserialize;

fn default_delimiter() -> char {
    ','
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HeaderStrategy {
    /// Text preceding the first delimiter
    LeadingSegment {
        #[serde(default = "default_delimiter")]
        delimiter: char,
    },
    /// The entire (normalized) header
    WholeCell,
}

impl Default for HeaderStrategy {
    fn default() -> Self {
        HeaderStrategy::LeadingSegment {
            delimiter: default_delimiter(),
        }
    }
}

impl HeaderStrategy {
    /// Extract the institution name from an already normalized header.
    /// Returns `None` when nothing usable remains.
    pub fn institution_name(&self, header: &str) -> Option<String> {
        let name = match self {
            HeaderStrategy::LeadingSegment { delimiter } => {
                header.split(*delimiter).next().unwrap_or("")
            }
            HeaderStrategy::WholeCell => header,
        };
        let name = name.split_whitespace().collect::<Vec<_>>().join(" ");
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }
}
