//! Run summaries for the three main operations, serializable as JSON.

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::Result;

/// Pairwise matching run summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchReport {
    /// Report generation timestamp
    pub generated_at: String,
    /// Lines read from the first file
    pub lines_a: u64,
    /// Lines read from the second file
    pub lines_b: u64,
    /// Partitions of the first file
    pub partitions_a: usize,
    /// Partitions of the second file
    pub partitions_b: usize,
    /// Partition pairs compared
    pub pairs: usize,
    /// Matches written
    pub matched: u64,
    /// Malformed lines skipped in the first file
    pub dropped_a: u64,
    /// Malformed lines skipped in the second file
    pub dropped_b: u64,
    /// Worker threads used
    pub threads: usize,
    /// Wall-clock duration in seconds
    pub duration_secs: f64,
}

/// External sort run summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortReport {
    pub generated_at: String,
    /// Lines read from the input
    pub total_lines: u64,
    /// Lines that survived filtering and were sorted
    pub sorted_lines: u64,
    /// Lines dropped for having too few fields
    pub dropped_malformed: u64,
    /// Lines dropped for an empty sort field
    pub dropped_empty_field: u64,
    /// Sort partitions used
    pub partitions: usize,
    pub duration_secs: f64,
}

/// Transitive grouping run summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupReport {
    pub generated_at: String,
    /// Valid rows grouped
    pub rows: u64,
    /// Malformed rows skipped
    pub dropped: u64,
    /// Groups emitted
    pub groups: u64,
    /// Groups with a single member
    pub singleton_groups: u64,
    pub duration_secs: f64,
}

/// Current local time in RFC 3339 form, used to stamp reports
pub fn timestamp_now() -> String {
    Local::now().to_rfc3339()
}

/// Write any report as pretty-printed JSON
pub fn write_json_report<T: Serialize>(report: &T, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json)?;
    Ok(())
}
