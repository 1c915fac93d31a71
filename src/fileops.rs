//! Small line-file utilities used around matching runs.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use ahash::AHashSet;

use crate::error::Result;
use crate::textio::{write_line, Encoding, LineReader};

/// Copy `src` to `dest` dropping duplicate lines. The first occurrence
/// wins and first-occurrence order is preserved. Returns
/// `(written, duplicates_dropped)`.
pub fn dedup_lines(src: &Path, dest: &Path, encoding: Encoding) -> Result<(u64, u64)> {
    let mut reader = LineReader::open(src, encoding)?;
    let mut writer = BufWriter::new(File::create(dest)?);

    let mut seen: AHashSet<String> = AHashSet::new();
    let mut written = 0u64;
    let mut dropped = 0u64;

    while let Some(line) = reader.next_line()? {
        if seen.insert(line.clone()) {
            write_line(&mut writer, &line, encoding)?;
            written += 1;
        } else {
            dropped += 1;
        }
    }

    writer.into_inner().map_err(|e| e.into_error())?;
    Ok((written, dropped))
}

/// Copy a two-field `key<sep>value` file to `dest` with the fields
/// swapped. Lines with fewer than 2 fields are dropped. Returns
/// `(written, dropped)`.
pub fn swap_fields(
    src: &Path,
    dest: &Path,
    encoding: Encoding,
    separator: &str,
) -> Result<(u64, u64)> {
    let mut reader = LineReader::open(src, encoding)?;
    let mut writer = BufWriter::new(File::create(dest)?);

    let mut written = 0u64;
    let mut dropped = 0u64;

    while let Some(line) = reader.next_line()? {
        let mut fields = line.split(separator);
        match (fields.next(), fields.next()) {
            (Some(first), Some(second)) => {
                let swapped = format!("{}{}{}", second, separator, first);
                write_line(&mut writer, &swapped, encoding)?;
                written += 1;
            }
            _ => dropped += 1,
        }
    }

    writer.into_inner().map_err(|e| e.into_error())?;
    Ok((written, dropped))
}
