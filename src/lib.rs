//! Approximate record matching and key-based grouping over very large
//! line-oriented text files.
//!
//! This library deduplicates and links records across two datasets when no
//! exact join key exists:
//! - Line-bounded file partitioning with ordered merge
//! - Pluggable similarity comparators (exact, bounded Jaro-Winkler,
//!   bounded Levenshtein)
//! - Length-bucketed candidate index for fuzzy-match pruning
//! - External field sorter (split, sort in memory, k-way merge)
//! - Pairwise matcher fanning partition pairs out over a sized worker pool
//! - Transitive key grouper computing connected components of key-pair
//!   rows without materializing a graph

pub mod cli;
pub mod compare;
pub mod error;
pub mod fileops;
pub mod grouper;
pub mod index;
pub mod matcher;
pub mod partition;
pub mod pool;
pub mod report;
pub mod sorter;
pub mod textio;
pub mod types;

// Re-export commonly used types
pub use compare::{
    bounded_levenshtein, jaro_similarity, jaro_winkler_similarity, SimilarityComparator,
};
pub use error::{LinkError, Result};
pub use fileops::{dedup_lines, swap_fields};
pub use grouper::group_file;
pub use index::LengthBucketedIndex;
pub use matcher::{match_files, match_files_streaming};
pub use partition::{merge, split, Partition, PartitionSet, SplitResult};
pub use pool::{cpu_count, smart_pool};
pub use report::{GroupReport, MatchReport, SortReport};
pub use sorter::{default_key_order, sort_file, sort_file_by, sort_file_to};
pub use textio::Encoding;
pub use types::{GroupConfig, KeyPair, KeyValue, MatchConfig, MatchProgress, Record, SortConfig};
