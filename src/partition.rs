//! Line-bounded file partitioning and ordered merge.
//!
//! A partition holds raw line bytes, so merging partitions back in order
//! reproduces the source file byte for byte.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{LinkError, Result};
use crate::textio::LINE_TERMINATOR;

/// An ordered, line-bounded slice of a file
#[derive(Debug, Clone)]
pub struct Partition {
    pub path: PathBuf,
    pub lines: u64,
}

/// Outcome of splitting a file
#[derive(Debug)]
pub struct SplitResult {
    pub partitions: Vec<Partition>,
    pub total_lines: u64,
    pub last_partition_lines: u64,
}

/// Owns a set of partition files and removes them when dropped
#[derive(Debug)]
pub struct PartitionSet {
    result: SplitResult,
}

impl PartitionSet {
    pub fn new(result: SplitResult) -> Self {
        Self { result }
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.result.partitions
    }

    pub fn total_lines(&self) -> u64 {
        self.result.total_lines
    }

    pub fn len(&self) -> usize {
        self.result.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.result.partitions.is_empty()
    }
}

impl Drop for PartitionSet {
    fn drop(&mut self) {
        for partition in &self.result.partitions {
            let _ = fs::remove_file(&partition.path);
        }
    }
}

/// Path of partition `index` of `file`: `<basename>-<index>` next to the source
pub fn partition_path(file: &Path, index: usize) -> PathBuf {
    let stem = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "partition".to_string());
    let dir = file.parent().unwrap_or_else(|| Path::new("."));
    dir.join(format!("{}-{}", stem, index))
}

/// Split `file` into partitions of at most `max_lines` lines each.
///
/// Relative line order and total line count are preserved; raw bytes are
/// copied through unmodified. An unreadable source aborts the whole split.
pub fn split(file: &Path, max_lines: u64) -> Result<SplitResult> {
    if max_lines == 0 {
        return Err(LinkError::InvalidArgument(
            "partition size must be at least 1 line".to_string(),
        ));
    }

    let source = File::open(file).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => LinkError::FileNotFound(file.display().to_string()),
        _ => LinkError::Io(e),
    })?;
    let mut reader = BufReader::new(source);

    let mut partitions: Vec<Partition> = Vec::new();
    let mut writer: Option<BufWriter<File>> = None;
    let mut current_lines = 0u64;
    let mut total_lines = 0u64;
    let mut buf: Vec<u8> = Vec::new();

    loop {
        buf.clear();
        let read = reader.read_until(b'\n', &mut buf)?;
        if read == 0 {
            break;
        }

        if writer.is_none() {
            let path = partition_path(file, partitions.len());
            writer = Some(BufWriter::new(File::create(&path)?));
            partitions.push(Partition { path, lines: 0 });
            current_lines = 0;
        }

        writer.as_mut().unwrap().write_all(&buf)?;
        current_lines += 1;
        total_lines += 1;

        if let Some(last) = partitions.last_mut() {
            last.lines = current_lines;
        }

        if current_lines >= max_lines {
            writer.take().unwrap().flush()?;
        }
    }

    if let Some(mut w) = writer.take() {
        w.flush()?;
    }

    let last_partition_lines = partitions.last().map(|p| p.lines).unwrap_or(0);

    Ok(SplitResult {
        partitions,
        total_lines,
        last_partition_lines,
    })
}

/// Concatenate partitions in the given order into `output`.
///
/// A line terminator is inserted between partitions only when the
/// preceding partition does not already end with one.
pub fn merge(partitions: &[Partition], output: &Path) -> Result<u64> {
    let mut writer = BufWriter::new(File::create(output)?);
    let mut bytes_written = 0u64;
    let mut pending_terminator = false;

    for partition in partitions {
        let mut reader = BufReader::new(File::open(&partition.path)?);
        let mut last_byte: Option<u8> = None;
        let mut wrote_any = false;

        loop {
            let chunk = reader.fill_buf()?;
            if chunk.is_empty() {
                break;
            }
            if pending_terminator {
                writer.write_all(LINE_TERMINATOR)?;
                bytes_written += LINE_TERMINATOR.len() as u64;
                pending_terminator = false;
            }
            writer.write_all(chunk)?;
            bytes_written += chunk.len() as u64;
            last_byte = chunk.last().copied();
            wrote_any = true;
            let consumed = chunk.len();
            reader.consume(consumed);
        }

        if wrote_any && last_byte != Some(b'\n') {
            pending_terminator = true;
        }
    }

    writer.flush()?;
    Ok(bytes_written)
}
