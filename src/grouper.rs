//! Transitive key grouper.
//!
//! Computes connected components over `(key1, key2)` rows where two rows
//! are adjacent if they share either key value. No edge set is ever
//! materialized: two sorted index arrays over an append-only row arena
//! plus binary search are enough. Single-threaded: the arena and its
//! annotations are owned by one thread.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Instant;

use ahash::AHashSet;
use uuid::Uuid;

use crate::error::Result;
use crate::report::{timestamp_now, GroupReport};
use crate::textio::{write_line, LineReader};
use crate::types::{GroupConfig, KeyPair};

/// Expansion rounds per group are capped well above any realistic chain
/// of shared keys.
const MAX_EXPANSION_ROUNDS: usize = 10_000;

/// Group the rows of a `key1<sep>key2` file and write one line per row:
/// `multiplicity<sep>group_id<sep>key1<sep>key2`, where multiplicity is
/// `"1"` for singleton groups and `"n"` otherwise.
///
/// Rows with fewer than 2 fields are skipped. Empty valid input produces
/// a single empty output line.
pub fn group_file(input: &Path, output: &Path, config: &GroupConfig) -> Result<GroupReport> {
    let start = Instant::now();

    let (arena, dropped) = read_rows(input, config)?;
    let mut writer = BufWriter::new(File::create(output)?);

    if arena.is_empty() {
        write_line(&mut writer, "", config.encoding)?;
        return Ok(GroupReport {
            generated_at: timestamp_now(),
            rows: 0,
            dropped,
            groups: 0,
            singleton_groups: 0,
            duration_secs: start.elapsed().as_secs_f64(),
        });
    }

    let total = arena.len();

    // Dual sort orders over the arena; rows keep their stable arena index
    let mut by_key1: Vec<u32> = (0..total as u32).collect();
    by_key1.sort_by(|&x, &y| arena[x as usize].key1.cmp(&arena[y as usize].key1));
    let mut by_key2: Vec<u32> = (0..total as u32).collect();
    by_key2.sort_by(|&x, &y| arena[x as usize].key2.cmp(&arena[y as usize].key2));

    let mut grouped = vec![false; total];
    let mut groups = 0u64;
    let mut singletons = 0u64;

    let mut position = 0usize;
    while position < total {
        let seed = by_key1[position] as usize;
        if grouped[seed] {
            position += 1;
            continue;
        }

        // Seed with the contiguous run sharing this key1
        let seed_key1 = arena[seed].key1.as_str();
        let mut members: Vec<u32> = Vec::new();
        while position < total && arena[by_key1[position] as usize].key1 == seed_key1 {
            members.push(by_key1[position]);
            position += 1;
        }

        expand_group(&arena, &by_key1, &by_key2, &mut members);

        for &member in &members {
            grouped[member as usize] = true;
        }

        groups += 1;
        if members.len() == 1 {
            singletons += 1;
        }

        // Emit members in arena order under a fresh group id
        members.sort_unstable();
        let group_id = Uuid::new_v4().simple().to_string();
        let multiplicity = if members.len() > 1 { "n" } else { "1" };
        for &member in &members {
            let row = &arena[member as usize];
            let line = format!(
                "{}{sep}{}{sep}{}{sep}{}",
                multiplicity,
                group_id,
                row.key1,
                row.key2,
                sep = config.separator,
            );
            write_line(&mut writer, &line, config.encoding)?;
        }
    }

    Ok(GroupReport {
        generated_at: timestamp_now(),
        rows: total as u64,
        dropped,
        groups,
        singleton_groups: singletons,
        duration_secs: start.elapsed().as_secs_f64(),
    })
}

/// Grow a seeded member set to its connected component.
///
/// Each round absorbs all rows reachable over the frontier's `key2`
/// values, then all rows reachable over any newly seen `key1` values,
/// until a round discovers nothing new.
fn expand_group(arena: &[KeyPair], by_key1: &[u32], by_key2: &[u32], members: &mut Vec<u32>) {
    let mut in_group: AHashSet<u32> = members.iter().copied().collect();
    let mut seen_key1: AHashSet<&str> = AHashSet::new();
    let mut seen_key2: AHashSet<&str> = AHashSet::new();
    let mut frontier_key2: Vec<&str> = Vec::new();

    for &member in members.iter() {
        seen_key1.insert(arena[member as usize].key1.as_str());
        if seen_key2.insert(arena[member as usize].key2.as_str()) {
            frontier_key2.push(arena[member as usize].key2.as_str());
        }
    }

    let mut rounds = 0usize;
    while !frontier_key2.is_empty() && rounds < MAX_EXPANSION_ROUNDS {
        rounds += 1;

        let mut new_key1: Vec<&str> = Vec::new();
        for key2 in std::mem::take(&mut frontier_key2) {
            for &row in equal_range(arena, by_key2, key2, |pair| pair.key2.as_str()) {
                if in_group.insert(row) {
                    members.push(row);
                }
                let key1 = arena[row as usize].key1.as_str();
                if seen_key1.insert(key1) {
                    new_key1.push(key1);
                }
            }
        }

        for key1 in new_key1 {
            for &row in equal_range(arena, by_key1, key1, |pair| pair.key1.as_str()) {
                if in_group.insert(row) {
                    members.push(row);
                }
                let key2 = arena[row as usize].key2.as_str();
                if seen_key2.insert(key2) {
                    frontier_key2.push(key2);
                }
            }
        }
    }
}

/// Contiguous span of index entries whose extracted key equals `key`
fn equal_range<'a, F>(arena: &[KeyPair], index: &'a [u32], key: &str, extract: F) -> &'a [u32]
where
    F: Fn(&KeyPair) -> &str,
{
    let low = index.partition_point(|&row| extract(&arena[row as usize]) < key);
    let high = index.partition_point(|&row| extract(&arena[row as usize]) <= key);
    &index[low..high]
}

/// Parse all rows of the input into the arena, counting skipped lines
fn read_rows(input: &Path, config: &GroupConfig) -> Result<(Vec<KeyPair>, u64)> {
    let mut reader = LineReader::open(input, config.encoding)?;
    let mut arena = Vec::new();
    let mut dropped = 0u64;
    while let Some(line) = reader.next_line()? {
        if line.is_empty() {
            continue;
        }
        match KeyPair::parse(&line, &config.separator) {
            Some(pair) => arena.push(pair),
            None => dropped += 1,
        }
    }
    Ok((arena, dropped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahash::AHashMap;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir() -> PathBuf {
        let mut dir = std::env::temp_dir();
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        dir.push(format!("reclink_grouper_{unique}"));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    struct ParsedRow {
        multiplicity: String,
        group_id: String,
        key1: String,
        key2: String,
    }

    fn run(rows: &str) -> Vec<ParsedRow> {
        let dir = temp_dir();
        let input = dir.join("pairs.txt");
        let output = dir.join("grouped.txt");
        fs::write(&input, rows).unwrap();
        group_file(&input, &output, &GroupConfig::default()).unwrap();

        fs::read_to_string(&output)
            .unwrap()
            .lines()
            .filter(|l| !l.is_empty())
            .map(|line| {
                let fields: Vec<&str> = line.split('\t').collect();
                assert_eq!(fields.len(), 4, "bad output line: {}", line);
                ParsedRow {
                    multiplicity: fields[0].to_string(),
                    group_id: fields[1].to_string(),
                    key1: fields[2].to_string(),
                    key2: fields[3].to_string(),
                }
            })
            .collect()
    }

    fn groups_by_id(rows: &[ParsedRow]) -> AHashMap<String, Vec<(String, String)>> {
        let mut map: AHashMap<String, Vec<(String, String)>> = AHashMap::new();
        for row in rows {
            map.entry(row.group_id.clone())
                .or_default()
                .push((row.key1.clone(), row.key2.clone()));
        }
        map
    }

    #[test]
    fn test_chain_and_singleton() {
        let rows = run("a\tx\nb\tx\nb\ty\nc\tz\n");
        assert_eq!(rows.len(), 4);

        let groups = groups_by_id(&rows);
        assert_eq!(groups.len(), 2);

        for (_, members) in groups {
            if members.len() == 3 {
                let mut sorted = members.clone();
                sorted.sort();
                assert_eq!(
                    sorted,
                    vec![
                        ("a".to_string(), "x".to_string()),
                        ("b".to_string(), "x".to_string()),
                        ("b".to_string(), "y".to_string()),
                    ]
                );
            } else {
                assert_eq!(members, vec![("c".to_string(), "z".to_string())]);
            }
        }

        for row in &rows {
            let expected = if row.key1 == "c" { "1" } else { "n" };
            assert_eq!(row.multiplicity, expected, "row {} {}", row.key1, row.key2);
        }
    }

    #[test]
    fn test_every_row_in_exactly_one_group() {
        let input = "a\tx\nb\tx\nb\ty\nc\tz\nd\ty\ne\tw\ne\tv\nf\tv\n";
        let rows = run(input);
        assert_eq!(rows.len(), 8);

        // output rows are a permutation of the input rows
        let mut seen: Vec<(String, String)> = rows
            .iter()
            .map(|r| (r.key1.clone(), r.key2.clone()))
            .collect();
        seen.sort();
        let mut expected: Vec<(String, String)> = input
            .lines()
            .map(|l| {
                let mut fields = l.split('\t');
                (
                    fields.next().unwrap().to_string(),
                    fields.next().unwrap().to_string(),
                )
            })
            .collect();
        expected.sort();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_transitive_chain_lands_in_one_group() {
        // a-x, b-x share x; b-y, d-y chain through y; long chain via shared keys
        let rows = run("a\tx\nb\tx\nb\ty\nd\ty\nd\tz\ne\tz\n");
        let groups = groups_by_id(&rows);
        assert_eq!(groups.len(), 1);
        assert!(rows.iter().all(|r| r.multiplicity == "n"));
    }

    #[test]
    fn test_duplicate_rows_stay_together() {
        let rows = run("a\tx\na\tx\n");
        let groups = groups_by_id(&rows);
        assert_eq!(groups.len(), 1);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.multiplicity == "n"));
    }

    #[test]
    fn test_rerun_same_partition_of_rows() {
        let input = "a\tx\nb\tx\nc\ty\nd\tz\nd\ty\n";
        let first = run(input);
        let second = run(input);

        // compare partitions as sets of member sets, ignoring group ids
        let as_partition = |rows: &[ParsedRow]| -> Vec<Vec<(String, String)>> {
            let mut sets: Vec<Vec<(String, String)>> = groups_by_id(rows)
                .into_iter()
                .map(|(_, mut members)| {
                    members.sort();
                    members
                })
                .collect();
            sets.sort();
            sets
        };
        assert_eq!(as_partition(&first), as_partition(&second));
    }

    #[test]
    fn test_group_ids_are_fresh_uuids() {
        let rows = run("a\tx\nc\tz\n");
        let groups = groups_by_id(&rows);
        assert_eq!(groups.len(), 2);
        for id in groups.keys() {
            assert_eq!(id.len(), 32);
            assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn test_empty_input_writes_single_empty_line() {
        let dir = temp_dir();
        let input = dir.join("pairs.txt");
        let output = dir.join("grouped.txt");
        fs::write(&input, "").unwrap();
        let report = group_file(&input, &output, &GroupConfig::default()).unwrap();
        assert_eq!(report.rows, 0);
        assert_eq!(report.groups, 0);
        let content = fs::read_to_string(&output).unwrap();
        assert!(content == "\n" || content == "\r\n");
    }

    #[test]
    fn test_malformed_rows_skipped() {
        let rows = run("a\tx\nmalformed-line\nb\ty\n");
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_report_counts() {
        let dir = temp_dir();
        let input = dir.join("pairs.txt");
        let output = dir.join("grouped.txt");
        fs::write(&input, "a\tx\nb\tx\nc\tz\nbad\n").unwrap();
        let report = group_file(&input, &output, &GroupConfig::default()).unwrap();
        assert_eq!(report.rows, 3);
        assert_eq!(report.dropped, 1);
        assert_eq!(report.groups, 2);
        assert_eq!(report.singleton_groups, 1);
    }
}
