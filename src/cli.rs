use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::compare::SimilarityComparator;
use crate::textio::Encoding;

/// Record linkage toolkit for large line-oriented text files
#[derive(Parser, Debug, Clone)]
#[command(name = "reclink")]
#[command(version = "0.1.0")]
#[command(about = "Approximate record matching and key-based grouping", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Fuzzy-match two key+content files and write matched key pairs
    Similarity(SimilarityArgs),

    /// Sort a huge delimited file by one field using bounded memory
    Sort(SortArgs),

    /// Assign group ids to key-pair rows connected by shared keys
    Group(GroupArgs),

    /// Remove duplicate lines from a file
    Dedup(DedupArgs),

    /// Swap the two fields of a key+value file
    Swap(SwapArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct SimilarityArgs {
    /// First input file (key + content per line)
    #[arg(value_name = "FILE_A")]
    pub file_a: PathBuf,

    /// Second input file (key + content per line)
    #[arg(value_name = "FILE_B")]
    pub file_b: PathBuf,

    /// Output file of matched key pairs
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,

    /// Similarity threshold in [0, 1]; 1.0 means exact matching
    #[arg(long = "threshold", default_value = "1.0")]
    pub threshold: f64,

    /// Comparator: jaro-winkler, levenshtein or exact
    #[arg(long = "comparator", default_value = "jaro-winkler")]
    pub comparator: String,

    /// Maximum edit distance for the levenshtein comparator
    #[arg(long = "max-distance", default_value = "0")]
    pub max_distance: usize,

    /// Field separator for all files
    #[arg(long = "separator", default_value = "\t")]
    pub separator: String,

    /// File encoding (utf8 or latin1)
    #[arg(long = "encoding", default_value = "utf8")]
    pub encoding: Encoding,

    /// Maximum lines per partition of the first file
    #[arg(long = "split-size-a", default_value = "100000")]
    pub split_size_a: u64,

    /// Maximum lines per partition of the second file
    #[arg(long = "split-size-b", default_value = "100000")]
    pub split_size_b: u64,

    /// Candidate pruning scope: only compare contents within this length distance
    #[arg(long = "length-scope")]
    pub length_scope: Option<usize>,

    /// CPU multiplier for the worker pool
    #[arg(long = "multiplier", default_value = "2")]
    pub multiplier: usize,

    /// Overall deadline in seconds
    #[arg(long = "deadline-secs")]
    pub deadline_secs: Option<u64>,

    /// Write a JSON run report to this path
    #[arg(long = "report")]
    pub report: Option<PathBuf>,

    /// Print per-pair progress while matching
    #[arg(long = "progress")]
    pub progress: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct SortArgs {
    /// File to sort
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Index of the field to order by
    #[arg(long = "field-index", default_value = "0")]
    pub field_index: usize,

    /// Field separator
    #[arg(long = "separator", default_value = "\t")]
    pub separator: String,

    /// File encoding (utf8 or latin1)
    #[arg(long = "encoding", default_value = "utf8")]
    pub encoding: Encoding,

    /// Keep lines whose sort field is empty
    #[arg(long = "allow-empty-field")]
    pub allow_empty_field: bool,

    /// Maximum lines per in-memory sort partition
    #[arg(long = "split-size", default_value = "100000")]
    pub split_size: u64,

    /// Output file; the input is replaced when omitted
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Write a JSON run report to this path
    #[arg(long = "report")]
    pub report: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct GroupArgs {
    /// Input file of key1 + key2 rows
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Output file of grouped rows
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,

    /// Field separator
    #[arg(long = "separator", default_value = "\t")]
    pub separator: String,

    /// File encoding (utf8 or latin1)
    #[arg(long = "encoding", default_value = "utf8")]
    pub encoding: Encoding,

    /// Write a JSON run report to this path
    #[arg(long = "report")]
    pub report: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct DedupArgs {
    /// Input file
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Output file
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,

    /// File encoding (utf8 or latin1)
    #[arg(long = "encoding", default_value = "utf8")]
    pub encoding: Encoding,
}

#[derive(Parser, Debug, Clone)]
pub struct SwapArgs {
    /// Input file
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Output file
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,

    /// Field separator
    #[arg(long = "separator", default_value = "\t")]
    pub separator: String,

    /// File encoding (utf8 or latin1)
    #[arg(long = "encoding", default_value = "utf8")]
    pub encoding: Encoding,
}

impl SimilarityArgs {
    /// Validate argument combinations
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(format!(
                "threshold ({}) must lie within [0.0, 1.0]",
                self.threshold
            ));
        }
        if self.separator.is_empty() {
            return Err("separator cannot be empty".to_string());
        }
        if self.split_size_a == 0 || self.split_size_b == 0 {
            return Err("split sizes must be at least 1".to_string());
        }
        if self.multiplier == 0 {
            return Err("multiplier must be at least 1".to_string());
        }
        match self.comparator.as_str() {
            "jaro-winkler" | "levenshtein" | "exact" => Ok(()),
            other => Err(format!(
                "unknown comparator '{}' (expected jaro-winkler, levenshtein or exact)",
                other
            )),
        }
    }

    /// Build the configured match predicate
    pub fn build_comparator(&self) -> SimilarityComparator {
        match self.comparator.as_str() {
            "levenshtein" => SimilarityComparator::Levenshtein {
                max_distance: self.max_distance,
            },
            "exact" => SimilarityComparator::Exact,
            _ => SimilarityComparator::JaroWinkler {
                threshold: self.threshold,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(threshold: f64, comparator: &str) -> SimilarityArgs {
        SimilarityArgs {
            file_a: PathBuf::from("a.txt"),
            file_b: PathBuf::from("b.txt"),
            output: PathBuf::from("out.txt"),
            threshold,
            comparator: comparator.to_string(),
            max_distance: 0,
            separator: "\t".to_string(),
            encoding: Encoding::Utf8,
            split_size_a: 100_000,
            split_size_b: 100_000,
            length_scope: None,
            multiplier: 2,
            deadline_secs: None,
            report: None,
            progress: false,
        }
    }

    #[test]
    fn test_similarity_args_validation() {
        assert!(args(0.9, "jaro-winkler").validate().is_ok());
        assert!(args(1.5, "jaro-winkler").validate().is_err());
        assert!(args(0.9, "soundex").validate().is_err());
    }

    #[test]
    fn test_comparator_selection() {
        assert_eq!(
            args(0.9, "jaro-winkler").build_comparator(),
            SimilarityComparator::JaroWinkler { threshold: 0.9 }
        );
        assert_eq!(args(0.9, "exact").build_comparator(), SimilarityComparator::Exact);
        let mut levenshtein = args(0.9, "levenshtein");
        levenshtein.max_distance = 2;
        assert_eq!(
            levenshtein.build_comparator(),
            SimilarityComparator::Levenshtein { max_distance: 2 }
        );
    }

    #[test]
    fn test_cli_parses_similarity() {
        let cli = Cli::try_parse_from([
            "reclink",
            "similarity",
            "a.txt",
            "b.txt",
            "-o",
            "out.txt",
            "--threshold",
            "0.9",
            "--length-scope",
            "4",
        ])
        .unwrap();
        match cli.command {
            Command::Similarity(args) => {
                assert_eq!(args.threshold, 0.9);
                assert_eq!(args.length_scope, Some(4));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
