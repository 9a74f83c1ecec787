//! Core records flowing through the import pipeline
//!
//! RawCell -> ClassifiedRow -> HierarchyState -> CandidateRecord -> CutoffRecord

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// File-level metadata recovered from the filename
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImportContext {
    pub counselling_type: String,
    pub year: i32,
    pub round: u32,
}

/// Stable identifier of an institution or program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub i64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Institution,
    Program,
}

impl EntityKind {
    pub fn table(self) -> &'static str {
        match self {
            EntityKind::Institution => "institutions",
            EntityKind::Program => "programs",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Institution => f.write_str("institution"),
            EntityKind::Program => f.write_str("program"),
        }
    }
}

/// Canonical institution or program row.
///
/// Location and type attributes are unknown at import time and stay `None`
/// until another collaborator fills them in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub name: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub category: Option<String>,
}

/// Flat record synthesized from one rank row and the hierarchy above it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRecord {
    pub institution_name: String,
    pub program_name: String,
    pub category: String,
    pub quota: String,
    pub rank: u32,
    pub context: ImportContext,
    /// 0-based row of the rank cell in the sheet
    pub source_row: usize,
    pub source_column: usize,
}

/// Identity of a logical cutoff record, independent of when it was imported
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NaturalKey {
    pub institution_id: EntityId,
    pub program_id: EntityId,
    pub counselling_type: String,
    pub year: i32,
    pub round: u32,
    pub category: String,
    pub quota: String,
    pub rank: u32,
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}|{}|{}|{}|{}",
            self.institution_id,
            self.program_id,
            self.counselling_type,
            self.year,
            self.round,
            self.category,
            self.quota,
            self.rank
        )
    }
}

/// Where and when a cutoff record was written
#[derive(Debug, Clone, PartialEq)]
pub struct Provenance {
    pub source_file: String,
    pub source_row: usize,
    pub source_column: usize,
    pub import_run: Uuid,
    pub imported_at: DateTime<Utc>,
}

/// Fully resolved record as persisted
#[derive(Debug, Clone, PartialEq)]
pub struct CutoffRecord {
    pub key: NaturalKey,
    pub provenance: Provenance,
}

impl CutoffRecord {
    pub fn new(
        candidate: &CandidateRecord,
        institution_id: EntityId,
        program_id: EntityId,
        source_file: &str,
        import_run: Uuid,
        imported_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key: NaturalKey {
                institution_id,
                program_id,
                counselling_type: candidate.context.counselling_type.clone(),
                year: candidate.context.year,
                round: candidate.context.round,
                category: candidate.category.clone(),
                quota: candidate.quota.clone(),
                rank: candidate.rank,
            },
            provenance: Provenance {
                source_file: source_file.to_string(),
                source_row: candidate.source_row,
                source_column: candidate.source_column,
                import_run,
                imported_at,
            },
        }
    }
}
