//! Hierarchy Tracker and Record Synthesizer
//!
//! A column reads top to bottom as program, category, quota headers with
//! rank values underneath. Each header stays in force until a header of the
//! same or a higher level replaces it:
//!
//! | row      | program | category | quota | emits |
//! |----------|---------|----------|-------|-------|
//! | Program  | set     | clear    | clear | -     |
//! | Category | keep    | set      | clear | -     |
//! | Quota    | keep    | keep     | set   | -     |
//! | Rank     | keep    | keep     | keep  | yes   |
//! | Unknown  | keep    | keep     | keep  | -     |

use crate::classify::{ClassifiedRow, RowClassifier, RowKind};
use crate::model::{CandidateRecord, ImportContext};
use crate::normalize::Normalizer;
use crate::sheet::Cell;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HierarchyState {
    pub program: Option<String>,
    pub category: Option<String>,
    pub quota: Option<String>,
}

/// Per-column state machine; starts empty at the top of every column
#[derive(Debug, Default)]
pub struct HierarchyTracker {
    state: HierarchyState,
}

impl HierarchyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &HierarchyState {
        &self.state
    }

    /// Fold one row into the state. Returns `true` for rank rows, which the
    /// caller hands to the synthesizer without changing state.
    pub fn observe(&mut self, row: &ClassifiedRow) -> bool {
        let text = row.text().map(str::to_string);
        match row.kind {
            RowKind::Program => {
                self.state.program = text;
                self.state.category = None;
                self.state.quota = None;
                false
            }
            RowKind::Category => {
                self.state.category = text;
                self.state.quota = None;
                false
            }
            RowKind::Quota => {
                self.state.quota = text;
                false
            }
            RowKind::Rank => true,
            RowKind::Unknown => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Program, category or quota not yet established
    MissingContext,
    /// Rank does not parse as a non-negative integer
    BadRank,
}

/// Turns rank rows of one column into candidate records
#[derive(Debug)]
pub struct RecordSynthesizer<'a> {
    pub institution_name: &'a str,
    pub context: &'a ImportContext,
    pub column: usize,
}

impl RecordSynthesizer<'_> {
    pub fn synthesize(
        &self,
        state: &HierarchyState,
        row: &ClassifiedRow,
    ) -> Result<CandidateRecord, DropReason> {
        let (Some(program), Some(category), Some(quota)) =
            (&state.program, &state.category, &state.quota)
        else {
            return Err(DropReason::MissingContext);
        };
        let rank = row.rank().ok_or(DropReason::BadRank)?;

        Ok(CandidateRecord {
            institution_name: self.institution_name.to_string(),
            program_name: program.clone(),
            category: category.clone(),
            quota: quota.clone(),
            rank,
            context: self.context.clone(),
            source_row: row.row,
            source_column: self.column,
        })
    }
}

/// Outcome of scanning one column, before entity resolution
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ColumnScan {
    pub candidates: Vec<CandidateRecord>,
    pub rows_seen: u64,
    pub rows_unknown: u64,
    pub dropped_missing_context: u64,
    pub dropped_bad_rank: u64,
}

/// Normalize, classify and fold every data row of a column (row 0 excluded)
pub fn scan_column(
    cells: &[Cell],
    normalizer: &Normalizer,
    classifier: &RowClassifier,
    synthesizer: &RecordSynthesizer<'_>,
) -> ColumnScan {
    let mut scan = ColumnScan::default();
    let mut tracker = HierarchyTracker::new();

    for (row, cell) in cells.iter().enumerate().skip(1) {
        if cell.is_empty() {
            continue;
        }
        scan.rows_seen += 1;

        let classified = match cell {
            Cell::Number(n) => classifier.classify_number(*n, row),
            other => classifier.classify_text(normalizer.normalize(other.as_text().trim()), row),
        };
        if classified.kind == RowKind::Unknown {
            scan.rows_unknown += 1;
            continue;
        }

        if !tracker.observe(&classified) {
            continue;
        }

        match synthesizer.synthesize(tracker.state(), &classified) {
            Ok(candidate) => scan.candidates.push(candidate),
            Err(reason) => {
                tracing::debug!(
                    column = synthesizer.column,
                    row,
                    ?reason,
                    state = ?tracker.state(),
                    "dropped rank row"
                );
                match reason {
                    DropReason::MissingContext => scan.dropped_missing_context += 1,
                    DropReason::BadRank => scan.dropped_bad_rank += 1,
                }
            }
        }
    }

    scan
}
