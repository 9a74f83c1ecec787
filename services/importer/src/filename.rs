//! Filename Metadata Parser
//!
//! Exports are named after the counselling they belong to, e.g.
//! `AIQ_PG_2023_Round_2.xlsx` or `KEA-2024-R1.csv`. A file whose name does
//! not yield all three of counselling type, year and round is skipped.

use crate::model::ImportContext;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct FilenameParser {
    counselling_types: Vec<String>,
}

impl FilenameParser {
    pub fn new(counselling_types: &[String]) -> Self {
        Self {
            counselling_types: counselling_types.iter().map(|t| t.to_uppercase()).collect(),
        }
    }

    pub fn parse(&self, path: &Path) -> Option<ImportContext> {
        let stem = path.file_stem()?.to_str()?;
        let tokens: Vec<String> = stem
            .split(|c: char| c == '_' || c == '-' || c == '.' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_uppercase())
            .collect();

        let counselling_type = tokens
            .iter()
            .find(|t| self.counselling_types.contains(t))?
            .clone();

        let year = tokens
            .iter()
            .filter(|t| t.len() == 4)
            .filter_map(|t| t.parse::<i32>().ok())
            .find(|y| (2000..=2100).contains(y))?;

        let round = parse_round(&tokens)?;

        Some(ImportContext {
            counselling_type,
            year,
            round,
        })
    }
}

/// `R2`, `ROUND2`, or `ROUND` followed by `2`
fn parse_round(tokens: &[String]) -> Option<u32> {
    for (i, token) in tokens.iter().enumerate() {
        let digits = token
            .strip_prefix("ROUND")
            .or_else(|| token.strip_prefix('R'))
            .filter(|rest| rest.bytes().all(|b| b.is_ascii_digit()));

        match digits {
            Some("") if token == "ROUND" => {
                if let Some(n) = tokens.get(i + 1).and_then(|next| next.parse().ok()) {
                    return Some(n);
                }
            }
            Some(rest) if !rest.is_empty() => return rest.parse().ok(),
            _ => {}
        }
    }
    None
}
