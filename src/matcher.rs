//! Pairwise file matcher.
//!
//! Both inputs are partitioned, every partition pair becomes one worker
//! task, and each task writes its own result file. Partials are merged in
//! ascending (i, j) order, which is the only cross-task ordering
//! guarantee.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::Instant;

use rayon::prelude::*;
use tokio::sync::mpsc::Sender;

use crate::error::{LinkError, Result};
use crate::index::LengthBucketedIndex;
use crate::partition::{self, Partition, PartitionSet};
use crate::pool::{pool_threads, smart_pool};
use crate::report::{timestamp_now, MatchReport};
use crate::textio::{write_line, LineReader};
use crate::types::{MatchConfig, MatchProgress, Record, SHORT_CONTENT_FLOOR};

/// Match two `key<sep>content` files and write `key_a<sep>key_b` lines
pub fn match_files(
    file_a: &Path,
    file_b: &Path,
    output: &Path,
    config: &MatchConfig,
) -> Result<MatchReport> {
    match_files_streaming(file_a, file_b, output, config, None)
}

/// As [`match_files`], reporting per-pair completion over a channel.
///
/// Any task failure, cancellation or deadline hit aborts the run and is
/// returned to the caller; partition and partial files are removed on all
/// exit paths.
pub fn match_files_streaming(
    file_a: &Path,
    file_b: &Path,
    output: &Path,
    config: &MatchConfig,
    progress: Option<Sender<MatchProgress>>,
) -> Result<MatchReport> {
    validate(config)?;

    let start = Instant::now();
    let deadline = config.deadline.map(|d| (start + d, d));

    let parts_a = PartitionSet::new(partition::split(file_a, config.split_size_a)?);
    let parts_b = PartitionSet::new(partition::split(file_b, config.split_size_b)?);
    let m = parts_a.len();
    let n = parts_b.len();

    let pairs: Vec<(usize, usize)> = (0..m)
        .flat_map(|i| (0..n).map(move |j| (i, j)))
        .collect();

    // Partial result files, owned by a guard before any task runs
    let partial_paths: Vec<PathBuf> = pairs
        .iter()
        .map(|&(i, j)| partial_path(output, i, j))
        .collect();
    let partials = ScopedFiles::new(partial_paths.clone());

    let matched_total = AtomicU64::new(0);
    let dropped_a = AtomicU64::new(0);
    let dropped_b = AtomicU64::new(0);

    let threads = pool_threads(m, n, config.multiplier);
    let pool = smart_pool(m, n, config.multiplier)?;
    pool.install(|| {
        pairs
            .par_iter()
            .zip(partial_paths.par_iter())
            .try_for_each(|(&(i, j), partial)| -> Result<()> {
                let outcome = run_pair(
                    &parts_a.partitions()[i],
                    &parts_b.partitions()[j],
                    partial,
                    config,
                    deadline,
                )?;

                matched_total.fetch_add(outcome.matched, AtomicOrdering::Relaxed);
                // Partition contents repeat across pairs; count each side once
                if j == 0 {
                    dropped_a.fetch_add(outcome.dropped_a, AtomicOrdering::Relaxed);
                }
                if i == 0 {
                    dropped_b.fetch_add(outcome.dropped_b, AtomicOrdering::Relaxed);
                }

                if let Some(ref sender) = progress {
                    if !sender.is_closed() {
                        let _ = sender.blocking_send(MatchProgress::PairCompleted {
                            a_index: i,
                            b_index: j,
                            matched: outcome.matched,
                        });
                    }
                }
                Ok(())
            })
    })?;

    // Deterministic (i, j) order is the construction order of the list
    let merged: Vec<Partition> = partial_paths
        .iter()
        .map(|path| Partition {
            path: path.clone(),
            lines: 0,
        })
        .collect();
    partition::merge(&merged, output)?;
    drop(partials);

    Ok(MatchReport {
        generated_at: timestamp_now(),
        lines_a: parts_a.total_lines(),
        lines_b: parts_b.total_lines(),
        partitions_a: m,
        partitions_b: n,
        pairs: m * n,
        matched: matched_total.into_inner(),
        dropped_a: dropped_a.into_inner(),
        dropped_b: dropped_b.into_inner(),
        threads,
        duration_secs: start.elapsed().as_secs_f64(),
    })
}

fn validate(config: &MatchConfig) -> Result<()> {
    for separator in [
        &config.separator_a,
        &config.separator_b,
        &config.separator_out,
    ] {
        if separator.is_empty() {
            return Err(LinkError::InvalidArgument(
                "separator must not be empty".to_string(),
            ));
        }
    }
    Ok(())
}

/// Partial result file for pair `(i, j)`: `<basename>-<i>-<j>` next to the output
fn partial_path(output: &Path, i: usize, j: usize) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "matched".to_string());
    let dir = output.parent().unwrap_or_else(|| Path::new("."));
    dir.join(format!("{}-{}-{}", stem, i, j))
}

struct PairOutcome {
    matched: u64,
    dropped_a: u64,
    dropped_b: u64,
}

/// Compare every record of one A-partition against candidates from one
/// B-partition and write matches to a private partial file.
fn run_pair(
    part_a: &Partition,
    part_b: &Partition,
    partial: &Path,
    config: &MatchConfig,
    deadline: Option<(Instant, std::time::Duration)>,
) -> Result<PairOutcome> {
    let (records_a, dropped_a) =
        read_records(&part_a.path, &config.separator_a, config)?;
    let (records_b, dropped_b) =
        read_records(&part_b.path, &config.separator_b, config)?;

    let index = config
        .length_scope
        .map(|_| LengthBucketedIndex::build(records_b.clone()));

    let mut writer = BufWriter::new(File::create(partial)?);
    let mut matched = 0u64;

    for record in &records_a {
        check_interrupted(config, deadline)?;

        let candidates: &[Record] = match (&index, config.length_scope) {
            (Some(index), Some(scope)) => index.query(record.length, scope),
            _ => &records_b,
        };

        for candidate in candidates {
            let is_match = if record.length < SHORT_CONTENT_FLOOR {
                record.content == candidate.content
            } else {
                config.comparator.matches(&record.content, &candidate.content)
            };
            if is_match {
                let line = format!(
                    "{}{}{}",
                    record.key, config.separator_out, candidate.key
                );
                write_line(&mut writer, &line, config.encoding)?;
                matched += 1;
            }
        }
    }

    writer.into_inner().map_err(|e| LinkError::Io(e.into_error()))?;

    Ok(PairOutcome {
        matched,
        dropped_a,
        dropped_b,
    })
}

fn check_interrupted(
    config: &MatchConfig,
    deadline: Option<(Instant, std::time::Duration)>,
) -> Result<()> {
    if let Some(ref cancel) = config.cancel {
        if cancel.load(AtomicOrdering::Relaxed) {
            return Err(LinkError::Cancelled);
        }
    }
    if let Some((at, duration)) = deadline {
        if Instant::now() >= at {
            return Err(LinkError::DeadlineExceeded(duration));
        }
    }
    Ok(())
}

/// Parse one partition into records, counting skipped malformed lines
fn read_records(
    path: &Path,
    separator: &str,
    config: &MatchConfig,
) -> Result<(Vec<Record>, u64)> {
    let mut reader = LineReader::open(path, config.encoding)?;
    let mut records = Vec::new();
    let mut dropped = 0u64;
    while let Some(line) = reader.next_line()? {
        match Record::parse(&line, separator) {
            Some(record) => records.push(record),
            None => dropped += 1,
        }
    }
    Ok((records, dropped))
}

/// Removes a set of files when dropped, whether or not they were created
struct ScopedFiles {
    paths: Vec<PathBuf>,
}

impl ScopedFiles {
    fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }
}

impl Drop for ScopedFiles {
    fn drop(&mut self) {
        for path in &self.paths {
            let _ = fs::remove_file(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::SimilarityComparator;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir() -> PathBuf {
        let mut dir = std::env::temp_dir();
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        dir.push(format!("reclink_matcher_{unique}"));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn output_lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| l.to_string())
            .collect()
    }

    #[test]
    fn test_close_names_match() {
        let dir = temp_dir();
        let file_a = dir.join("a.txt");
        let file_b = dir.join("b.txt");
        let output = dir.join("matched.txt");
        fs::write(&file_a, "K1\tAcme Corp\nK2\tAcme Crop\n").unwrap();
        fs::write(&file_b, "J1\tAcme Corp.\n").unwrap();

        let config = MatchConfig {
            comparator: SimilarityComparator::JaroWinkler { threshold: 0.9 },
            ..MatchConfig::default()
        };
        let report = match_files(&file_a, &file_b, &output, &config).unwrap();

        let lines = output_lines(&output);
        assert!(lines.contains(&"K1\tJ1".to_string()));
        assert_eq!(report.lines_a, 2);
        assert_eq!(report.lines_b, 1);
        assert!(report.matched >= 1);
    }

    #[test]
    fn test_threshold_one_requires_exact() {
        let dir = temp_dir();
        let file_a = dir.join("a.txt");
        let file_b = dir.join("b.txt");
        let output = dir.join("matched.txt");
        fs::write(&file_a, "K1\tAcme Corp\nK2\tAcme Crop\n").unwrap();
        fs::write(&file_b, "J1\tAcme Corp.\n").unwrap();

        let config = MatchConfig {
            comparator: SimilarityComparator::JaroWinkler { threshold: 1.0 },
            ..MatchConfig::default()
        };
        let report = match_files(&file_a, &file_b, &output, &config).unwrap();
        assert_eq!(report.matched, 0);
        assert_eq!(fs::read(&output).unwrap(), b"");
    }

    #[test]
    fn test_partials_merge_in_pair_order() {
        let dir = temp_dir();
        let file_a = dir.join("a.txt");
        let file_b = dir.join("b.txt");
        let output = dir.join("matched.txt");
        // two partitions per side, every content identical so all pairs match
        fs::write(&file_a, "A0\tsame\nA1\tsame\n").unwrap();
        fs::write(&file_b, "B0\tsame\nB1\tsame\n").unwrap();

        let config = MatchConfig {
            comparator: SimilarityComparator::Exact,
            split_size_a: 1,
            split_size_b: 1,
            ..MatchConfig::default()
        };
        let report = match_files(&file_a, &file_b, &output, &config).unwrap();
        assert_eq!(report.partitions_a, 2);
        assert_eq!(report.partitions_b, 2);
        assert_eq!(report.pairs, 4);
        assert_eq!(
            output_lines(&output),
            vec!["A0\tB0", "A0\tB1", "A1\tB0", "A1\tB1"]
        );
    }

    #[test]
    fn test_short_content_requires_exact_match() {
        let dir = temp_dir();
        let file_a = dir.join("a.txt");
        let file_b = dir.join("b.txt");
        let output = dir.join("matched.txt");
        fs::write(&file_a, "K1\tLiu\nK2\tABCD\n").unwrap();
        fs::write(&file_b, "J1\tLIU\nJ2\tABCD\n").unwrap();

        // a permissive comparator still cannot fuzzy-match short content
        let config = MatchConfig {
            comparator: SimilarityComparator::JaroWinkler { threshold: 0.1 },
            ..MatchConfig::default()
        };
        let report = match_files(&file_a, &file_b, &output, &config).unwrap();
        assert_eq!(output_lines(&output), vec!["K2\tJ2"]);
        assert_eq!(report.matched, 1);
    }

    #[test]
    fn test_length_scope_pruning_keeps_close_lengths() {
        let dir = temp_dir();
        let file_a = dir.join("a.txt");
        let file_b = dir.join("b.txt");
        let output = dir.join("matched.txt");
        fs::write(&file_a, "K1\tAcme Corp\n").unwrap();
        fs::write(
            &file_b,
            "J1\tAcme Corp.\nJ2\tAcme Corporation Holdings Ltd\n",
        )
        .unwrap();

        let config = MatchConfig {
            comparator: SimilarityComparator::JaroWinkler { threshold: 0.9 },
            length_scope: Some(2),
            ..MatchConfig::default()
        };
        let report = match_files(&file_a, &file_b, &output, &config).unwrap();
        assert_eq!(output_lines(&output), vec!["K1\tJ1"]);
        assert_eq!(report.matched, 1);
    }

    #[test]
    fn test_scoped_and_naive_agree() {
        let dir = temp_dir();
        let file_a = dir.join("a.txt");
        let file_b = dir.join("b.txt");
        fs::write(
            &file_a,
            "A1\tJohnson & Sons\nA2\tAcme Corp\nA3\tWidget Works\n",
        )
        .unwrap();
        fs::write(
            &file_b,
            "B1\tJohnson and Sons\nB2\tAcme Crop\nB3\tWidget Work\nB4\tUnrelated Name Co\n",
        )
        .unwrap();

        let naive_out = dir.join("naive.txt");
        let scoped_out = dir.join("scoped.txt");
        let base = MatchConfig {
            comparator: SimilarityComparator::JaroWinkler { threshold: 0.88 },
            ..MatchConfig::default()
        };
        match_files(&file_a, &file_b, &naive_out, &base).unwrap();

        let scoped = MatchConfig {
            length_scope: Some(4),
            ..base
        };
        match_files(&file_a, &file_b, &scoped_out, &scoped).unwrap();

        let mut naive = output_lines(&naive_out);
        let mut pruned = output_lines(&scoped_out);
        naive.sort();
        pruned.sort();
        assert_eq!(naive, pruned);
    }

    #[test]
    fn test_malformed_lines_skipped_and_counted() {
        let dir = temp_dir();
        let file_a = dir.join("a.txt");
        let file_b = dir.join("b.txt");
        let output = dir.join("matched.txt");
        fs::write(&file_a, "K1\tAcme Corp\njust-one-field\n").unwrap();
        fs::write(&file_b, "J1\tAcme Corp\n").unwrap();

        let config = MatchConfig {
            comparator: SimilarityComparator::Exact,
            ..MatchConfig::default()
        };
        let report = match_files(&file_a, &file_b, &output, &config).unwrap();
        assert_eq!(report.dropped_a, 1);
        assert_eq!(report.dropped_b, 0);
        assert_eq!(output_lines(&output), vec!["K1\tJ1"]);
    }

    #[test]
    fn test_cancellation_surfaces() {
        let dir = temp_dir();
        let file_a = dir.join("a.txt");
        let file_b = dir.join("b.txt");
        let output = dir.join("matched.txt");
        fs::write(&file_a, "K1\tAcme Corp\n").unwrap();
        fs::write(&file_b, "J1\tAcme Corp\n").unwrap();

        let cancel = Arc::new(AtomicBool::new(true));
        let config = MatchConfig {
            cancel: Some(cancel),
            ..MatchConfig::default()
        };
        let err = match_files(&file_a, &file_b, &output, &config).unwrap_err();
        assert!(matches!(err, LinkError::Cancelled));
    }

    #[test]
    fn test_cleanup_after_run() {
        let dir = temp_dir();
        let file_a = dir.join("a.txt");
        let file_b = dir.join("b.txt");
        let output = dir.join("matched.txt");
        fs::write(&file_a, "K1\tx y z 1\nK2\tx y z 2\n").unwrap();
        fs::write(&file_b, "J1\tx y z 1\n").unwrap();

        let config = MatchConfig {
            comparator: SimilarityComparator::Exact,
            split_size_a: 1,
            split_size_b: 1,
            ..MatchConfig::default()
        };
        match_files(&file_a, &file_b, &output, &config).unwrap();

        let leftovers: Vec<String> = fs::read_dir(&dir)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with("a-") || name.starts_with("b-") || name.starts_with("matched-"))
            .collect();
        assert!(leftovers.is_empty(), "leftover files: {:?}", leftovers);
    }

    #[test]
    fn test_empty_inputs_produce_empty_output() {
        let dir = temp_dir();
        let file_a = dir.join("a.txt");
        let file_b = dir.join("b.txt");
        let output = dir.join("matched.txt");
        fs::write(&file_a, "").unwrap();
        fs::write(&file_b, "J1\tAcme Corp\n").unwrap();

        let report = match_files(&file_a, &file_b, &output, &MatchConfig::default()).unwrap();
        assert_eq!(report.pairs, 0);
        assert_eq!(report.matched, 0);
        assert_eq!(fs::read(&output).unwrap(), b"");
    }
}
