//! Normalizer - repairs known lexical corruption before classification
//!
//! Steps, applied in order:
//! 1. Rejoin a rank split after its fifth digit ("10248 0" -> "102480")
//! 2. Drop whitespace inside a cell made only of digits ("1024 8" -> "10248")
//! 3. Replace known typos in label text, whole words only
//! 4. Collapse a duplicated leading header segment ("A, A, City" -> "A, City")
//!
//! `normalize` is pure and idempotent: anything it does not recognize passes
//! through untouched.

use crate::config::TypoRule;
use crate::error::ConfigError;
use regex::{Regex, RegexBuilder};

/// Five digits, a stray space, then the rest of the number
const SPLIT_RANK_PATTERN: &str = r"\b([0-9]{5}) +([0-9]+)\b";
const SPACED_DIGITS_PATTERN: &str = r"^[0-9][0-9\s]*[0-9]$";

#[derive(Debug)]
struct CompiledTypo {
    pattern: Regex,
    replacement: String,
}

#[derive(Debug)]
pub struct Normalizer {
    split_rank: Regex,
    spaced_digits: Regex,
    typos: Vec<CompiledTypo>,
}

impl Normalizer {
    /// Compile the typo dictionary.
    ///
    /// Fails if a replacement would itself be matched by one of the rules,
    /// since that would make a second pass change the text again.
    pub fn new(typos: &[TypoRule]) -> Result<Self, ConfigError> {
        let compiled = typos
            .iter()
            .map(|rule| {
                Ok(CompiledTypo {
                    pattern: typo_pattern(&rule.from)?,
                    replacement: rule.to.clone(),
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        for (rule, typo) in typos.iter().zip(&compiled) {
            for (other_rule, other) in typos.iter().zip(&compiled) {
                if other.pattern.is_match(&typo.replacement) {
                    return Err(ConfigError::UnstableTypo {
                        from: rule.from.clone(),
                        to: rule.to.clone(),
                        other: other_rule.from.clone(),
                    });
                }
            }
        }

        Ok(Self {
            split_rank: compile(SPLIT_RANK_PATTERN)?,
            spaced_digits: compile(SPACED_DIGITS_PATTERN)?,
            typos: compiled,
        })
    }

    pub fn normalize(&self, raw: &str) -> String {
        let mut text = self.split_rank.replace_all(raw, "$1$2").into_owned();

        if self.spaced_digits.is_match(&text) {
            text.retain(|c| !c.is_whitespace());
        }

        for typo in &self.typos {
            if typo.pattern.is_match(&text) {
                text = typo
                    .pattern
                    .replace_all(&text, typo.replacement.as_str())
                    .into_owned();
            }
        }

        collapse_repeated_lead(text)
    }
}

fn compile(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Whole-word, case-insensitive, any run of whitespace between words
fn typo_pattern(from: &str) -> Result<Regex, ConfigError> {
    let words: Vec<String> = from.split_whitespace().map(regex::escape).collect();
    let pattern = format!(r"\b{}\b", words.join(r"\s+"));
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| ConfigError::Pattern { pattern, source })
}

/// "NAME, NAME, REST" -> "NAME, REST", repeated until the lead is unique
fn collapse_repeated_lead(mut text: String) -> String {
    loop {
        let collapsed = {
            let Some((first, rest)) = text.split_once(',') else {
                break;
            };
            let Some((second, tail)) = rest.split_once(',') else {
                break;
            };
            let lead = first.trim();
            if lead.is_empty() || lead != second.trim() {
                break;
            }
            format!("{}, {}", lead, tail.trim_start())
        };
        text = collapsed;
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_typos;

    fn normalizer() -> Normalizer {
        Normalizer::new(&default_typos()).unwrap()
    }

    // -------------------------------------------------------------------------
    // DIGIT REPAIR
    // -------------------------------------------------------------------------

    #[test]
    fn test_split_after_fifth_digit_is_rejoined() {
        assert_eq!(normalizer().normalize("10248 0"), "102480");
    }

    #[test]
    fn test_split_rank_inside_label_text() {
        assert_eq!(normalizer().normalize("RANK 10248 07 (R1)"), "RANK 1024807 (R1)");
    }

    #[test]
    fn test_split_rank_requires_exactly_five_digits() {
        // Only a five-digit lead is the export artifact
        assert_eq!(normalizer().normalize("AB 123456 7"), "AB 123456 7");
        assert_eq!(normalizer().normalize("AB 1234 7"), "AB 1234 7");
    }

    #[test]
    fn test_pure_digit_cell_loses_internal_whitespace() {
        assert_eq!(normalizer().normalize("1024 8"), "10248");
        assert_eq!(normalizer().normalize("1 2 3"), "123");
    }

    #[test]
    fn test_digits_mixed_with_letters_keep_spaces() {
        assert_eq!(normalizer().normalize("SEAT 12 3"), "SEAT 12 3");
    }

    // -------------------------------------------------------------------------
    // TYPO DICTIONARY
    // -------------------------------------------------------------------------

    #[test]
    fn test_split_word_typo_is_joined() {
        assert_eq!(normalizer().normalize("MANAGE MENT QUOTA"), "MANAGEMENT QUOTA");
        assert_eq!(normalizer().normalize("manage   ment quota"), "MANAGEMENT quota");
    }

    #[test]
    fn test_typo_only_matches_whole_words() {
        assert_eq!(normalizer().normalize("QOUTAS"), "QOUTAS");
        assert_eq!(normalizer().normalize("NRI QOUTA"), "NRI QUOTA");
    }

    #[test]
    fn test_unstable_typo_dictionary_is_rejected() {
        let rules = vec![
            TypoRule::new("GEN", "GENERAL"),
            TypoRule::new("GENERAL", "GENERAL CATEGORY"),
        ];
        assert!(matches!(
            Normalizer::new(&rules),
            Err(ConfigError::UnstableTypo { .. })
        ));
    }

    // -------------------------------------------------------------------------
    // DUPLICATED HEADER SEGMENT
    // -------------------------------------------------------------------------

    #[test]
    fn test_duplicated_institution_lead_is_collapsed() {
        assert_eq!(
            normalizer().normalize("Govt Medical College, Govt Medical College, Kota, Rajasthan"),
            "Govt Medical College, Kota, Rajasthan"
        );
    }

    #[test]
    fn test_triplicated_lead_collapses_fully() {
        assert_eq!(normalizer().normalize("A, A, A, B"), "A, B");
    }

    #[test]
    fn test_distinct_segments_untouched() {
        let header = "Example Medical College, City, State";
        assert_eq!(normalizer().normalize(header), header);
    }

    // -------------------------------------------------------------------------
    // PROPERTIES
    // -------------------------------------------------------------------------

    #[test]
    fn test_unrecognized_input_passes_through() {
        for raw in ["", "  ", "M.D. General Medicine", "OPEN", "-", "12.5", "ALL INDIA QUOTA"] {
            assert_eq!(normalizer().normalize(raw), raw);
        }
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "10248 0",
            "1024 8",
            "11111 22222 33333",
            "A 11111 22222 33333",
            "MANAGE MENT",
            "allindia qouta",
            "X, X, X, Y, Y",
            " X , X, Y",
            "M.D. (General Medicine)",
            "12345 6, 12345 6, City",
            "",
        ];
        let normalizer = normalizer();
        for raw in samples {
            let once = normalizer.normalize(raw);
            assert_eq!(normalizer.normalize(&once), once, "input {:?}", raw);
        }
    }
}
