use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use crate::compare::SimilarityComparator;
use crate::textio::Encoding;

/// Contents shorter than this many characters are matched by exact
/// equality and indexed by exact length class instead of length scope.
pub const SHORT_CONTENT_FLOOR: usize = 5;

/// A parsed matching record: key, comparable content and its length in characters
#[derive(Debug, Clone)]
pub struct Record {
    pub key: String,
    pub content: String,
    pub length: usize,
}

impl Record {
    /// Parse a `key<sep>content` line; lines with fewer than 2 fields yield None
    pub fn parse(line: &str, separator: &str) -> Option<Self> {
        let mut fields = line.split(separator);
        let key = fields.next()?;
        let content = fields.next()?;
        Some(Self {
            key: key.to_string(),
            content: content.to_string(),
            length: content.chars().count(),
        })
    }
}

/// Sort carrier: an extracted field plus the full line it came from
#[derive(Debug, Clone)]
pub struct KeyValue {
    pub key: String,
    pub line: String,
}

impl KeyValue {
    /// Extract `fields[field_index]` from a line. Lines with too few fields
    /// yield None; an empty field yields None unless allowed.
    pub fn parse(
        line: &str,
        separator: &str,
        field_index: usize,
        allow_empty_field: bool,
    ) -> Option<Self> {
        let key = line.split(separator).nth(field_index)?;
        if !allow_empty_field && key.trim().is_empty() {
            return None;
        }
        Some(Self {
            key: key.to_string(),
            line: line.to_string(),
        })
    }
}

/// One row of a key-pair file, held in the grouper's arena
#[derive(Debug, Clone)]
pub struct KeyPair {
    pub key1: String,
    pub key2: String,
}

impl KeyPair {
    /// Parse a `key1<sep>key2` line; lines with fewer than 2 fields yield None
    pub fn parse(line: &str, separator: &str) -> Option<Self> {
        let mut fields = line.split(separator);
        let key1 = fields.next()?;
        let key2 = fields.next()?;
        Some(Self {
            key1: key1.to_string(),
            key2: key2.to_string(),
        })
    }
}

/// Pairwise matcher configuration
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Field separator of the first input file
    pub separator_a: String,

    /// Field separator of the second input file
    pub separator_b: String,

    /// Field separator of the output file
    pub separator_out: String,

    /// Encoding shared by inputs and output
    pub encoding: Encoding,

    /// Match predicate applied to record contents
    pub comparator: SimilarityComparator,

    /// Maximum lines per partition of the first file
    pub split_size_a: u64,

    /// Maximum lines per partition of the second file
    pub split_size_b: u64,

    /// When set, candidates are pruned to records whose content length
    /// lies within this scope of the probe length
    pub length_scope: Option<usize>,

    /// CPU multiplier for the worker pool
    pub multiplier: usize,

    /// Overall deadline for the whole matching run
    pub deadline: Option<Duration>,

    /// Cooperative cancellation flag checked by in-flight tasks
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            separator_a: "\t".to_string(),
            separator_b: "\t".to_string(),
            separator_out: "\t".to_string(),
            encoding: Encoding::Utf8,
            comparator: SimilarityComparator::JaroWinkler { threshold: 1.0 },
            split_size_a: 100_000,
            split_size_b: 100_000,
            length_scope: None,
            multiplier: 2,
            deadline: None,
            cancel: None,
        }
    }
}

/// External field sorter configuration
#[derive(Debug, Clone)]
pub struct SortConfig {
    /// Field separator
    pub separator: String,

    /// Index of the field the file is ordered by
    pub field_index: usize,

    /// Keep lines whose extracted field is empty
    pub allow_empty_field: bool,

    /// Maximum lines per in-memory sort partition
    pub split_size: u64,

    /// File encoding
    pub encoding: Encoding,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            separator: "\t".to_string(),
            field_index: 0,
            allow_empty_field: false,
            split_size: 100_000,
            encoding: Encoding::Utf8,
        }
    }
}

/// Transitive key grouper configuration
#[derive(Debug, Clone)]
pub struct GroupConfig {
    /// Field separator of input and output
    pub separator: String,

    /// File encoding
    pub encoding: Encoding,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            separator: "\t".to_string(),
            encoding: Encoding::Utf8,
        }
    }
}

/// Progress update sent by matching tasks over a tokio channel
#[derive(Debug, Clone)]
pub enum MatchProgress {
    /// A partition pair finished with this many matches
    PairCompleted {
        a_index: usize,
        b_index: usize,
        matched: u64,
    },
}
