//! External field sorter: filter, split, sort each partition in memory,
//! then k-way merge the sorted partitions.
//!
//! Handles files far larger than memory; only one partition is ever held
//! in memory at a time per worker.

use std::cmp::Ordering;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;

use crate::error::{LinkError, Result};
use crate::partition::{self, Partition, PartitionSet, SplitResult};
use crate::pool::smart_pool;
use crate::report::{timestamp_now, SortReport};
use crate::textio::{write_line, LineReader};
use crate::types::{KeyValue, SortConfig};

/// Default key ordering: case-insensitive comparison with a byte-wise
/// tiebreak. Callers needing locale collation supply their own comparator.
pub fn default_key_order(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Sort `file` in place by the configured field
pub fn sort_file(file: &Path, config: &SortConfig) -> Result<SortReport> {
    sort_file_by(file, file, config, default_key_order)
}

/// Sort `file` into `output` by the configured field
pub fn sort_file_to(file: &Path, output: &Path, config: &SortConfig) -> Result<SortReport> {
    sort_file_by(file, output, config, default_key_order)
}

/// Sort `file` into `output` ordering extracted fields by `compare`.
///
/// Lines with too few fields are dropped; empty fields are dropped unless
/// allowed. Any I/O failure aborts the whole sort. Equal keys across
/// partitions merge in partition-index order.
pub fn sort_file_by<F>(
    file: &Path,
    output: &Path,
    config: &SortConfig,
    compare: F,
) -> Result<SortReport>
where
    F: Fn(&str, &str) -> Ordering + Sync,
{
    if config.separator.is_empty() {
        return Err(LinkError::InvalidArgument(
            "separator must not be empty".to_string(),
        ));
    }
    if config.split_size == 0 {
        return Err(LinkError::InvalidArgument(
            "split size must be at least 1 line".to_string(),
        ));
    }

    let start = Instant::now();

    // Filter pass: valid lines stream into bounded partitions
    let (partitions, stats) = split_filtered(file, config)?;

    // In-memory sort per partition, one pool task each
    let pool = smart_pool(partitions.len(), 1, 2)?;
    pool.install(|| {
        partitions
            .partitions()
            .par_iter()
            .try_for_each(|partition| sort_partition(partition, config, &compare))
    })?;

    // K-way merge into a sibling temp file, then move over the output
    let merged = merge_target(output);
    merge_sorted(partitions.partitions(), &merged, config, &compare)?;
    fs::rename(&merged, output)?;
    drop(partitions);

    Ok(SortReport {
        generated_at: timestamp_now(),
        total_lines: stats.total_lines,
        sorted_lines: stats.kept_lines,
        dropped_malformed: stats.dropped_malformed,
        dropped_empty_field: stats.dropped_empty_field,
        partitions: stats.partition_count,
        duration_secs: start.elapsed().as_secs_f64(),
    })
}

struct FilterStats {
    total_lines: u64,
    kept_lines: u64,
    dropped_malformed: u64,
    dropped_empty_field: u64,
    partition_count: usize,
}

/// Read `file`, drop invalid lines, and write the survivors into
/// partitions of at most `split_size` lines next to the input.
fn split_filtered(file: &Path, config: &SortConfig) -> Result<(PartitionSet, FilterStats)> {
    let mut reader = LineReader::open(file, config.encoding)?;

    let mut partitions: Vec<Partition> = Vec::new();
    let mut writer: Option<BufWriter<File>> = None;
    let mut current_lines = 0u64;
    let mut stats = FilterStats {
        total_lines: 0,
        kept_lines: 0,
        dropped_malformed: 0,
        dropped_empty_field: 0,
        partition_count: 0,
    };

    while let Some(line) = reader.next_line()? {
        stats.total_lines += 1;

        let field = line.split(config.separator.as_str()).nth(config.field_index);
        match field {
            None => {
                stats.dropped_malformed += 1;
                continue;
            }
            Some(value) if !config.allow_empty_field && value.trim().is_empty() => {
                stats.dropped_empty_field += 1;
                continue;
            }
            Some(_) => {}
        }

        if writer.is_none() {
            let path = partition::partition_path(file, partitions.len());
            writer = Some(BufWriter::new(File::create(&path)?));
            partitions.push(Partition { path, lines: 0 });
            current_lines = 0;
        }

        write_line(writer.as_mut().unwrap(), &line, config.encoding)?;
        current_lines += 1;
        stats.kept_lines += 1;
        if let Some(last) = partitions.last_mut() {
            last.lines = current_lines;
        }

        if current_lines >= config.split_size {
            writer.take().unwrap().flush()?;
        }
    }

    if let Some(mut w) = writer.take() {
        w.flush()?;
    }

    stats.partition_count = partitions.len();
    let last_partition_lines = partitions.last().map(|p| p.lines).unwrap_or(0);
    let total_lines = stats.kept_lines;

    Ok((
        PartitionSet::new(SplitResult {
            partitions,
            total_lines,
            last_partition_lines,
        }),
        stats,
    ))
}

fn merge_target(output: &Path) -> PathBuf {
    let stem = output
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "sorted".to_string());
    let dir = output.parent().unwrap_or_else(|| Path::new("."));
    dir.join(format!("{}-merging", stem))
}

/// Sort one partition fully in memory and rewrite it in place
fn sort_partition<F>(partition: &Partition, config: &SortConfig, compare: &F) -> Result<()>
where
    F: Fn(&str, &str) -> Ordering + Sync,
{
    let mut reader = LineReader::open(&partition.path, config.encoding)?;
    let mut entries: Vec<KeyValue> = Vec::with_capacity(partition.lines as usize);
    while let Some(line) = reader.next_line()? {
        if let Some(kv) = KeyValue::parse(
            &line,
            &config.separator,
            config.field_index,
            config.allow_empty_field,
        ) {
            entries.push(kv);
        }
    }

    entries.sort_by(|x, y| compare(&x.key, &y.key));

    let mut writer = BufWriter::new(File::create(&partition.path)?);
    for entry in &entries {
        write_line(&mut writer, &entry.line, config.encoding)?;
    }
    writer.flush()?;
    Ok(())
}

/// One read cursor per sorted partition; repeatedly emit the minimum head.
fn merge_sorted<F>(
    partitions: &[Partition],
    output: &Path,
    config: &SortConfig,
    compare: &F,
) -> Result<()>
where
    F: Fn(&str, &str) -> Ordering + Sync,
{
    let mut writer = BufWriter::new(File::create(output)?);

    let mut cursors: Vec<LineReader> = Vec::with_capacity(partitions.len());
    let mut heads: Vec<Option<(String, String)>> = Vec::with_capacity(partitions.len());
    for partition in partitions {
        let mut cursor = LineReader::open(&partition.path, config.encoding)?;
        let head = advance(&mut cursor, config)?;
        cursors.push(cursor);
        heads.push(head);
    }

    loop {
        // Lowest partition index wins ties: later cursors must be strictly
        // smaller to displace the current minimum.
        let mut min_index: Option<usize> = None;
        for (index, head) in heads.iter().enumerate() {
            if let Some((key, _)) = head {
                match min_index {
                    None => min_index = Some(index),
                    Some(current) => {
                        let (current_key, _) = heads[current].as_ref().unwrap();
                        if compare(key, current_key) == Ordering::Less {
                            min_index = Some(index);
                        }
                    }
                }
            }
        }

        let Some(winner) = min_index else { break };
        let (_, line) = heads[winner].take().unwrap();
        write_line(&mut writer, &line, config.encoding)?;
        heads[winner] = advance(&mut cursors[winner], config)?;
    }

    writer.flush()?;
    Ok(())
}

/// Next (extracted key, line) of a cursor, skipping lines that no longer
/// parse (none should exist after the filter pass).
fn advance(cursor: &mut LineReader, config: &SortConfig) -> Result<Option<(String, String)>> {
    while let Some(line) = cursor.next_line()? {
        if let Some(kv) = KeyValue::parse(
            &line,
            &config.separator,
            config.field_index,
            config.allow_empty_field,
        ) {
            return Ok(Some((kv.key, kv.line)));
        }
    }
    Ok(None)
}
