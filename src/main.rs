mod cli;
mod compare;
mod error;
mod fileops;
mod grouper;
mod index;
mod matcher;
mod partition;
mod pool;
mod report;
mod sorter;
mod textio;
mod types;

use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;

use cli::{Cli, Command, GroupArgs, SimilarityArgs, SortArgs};
use report::write_json_report;
use types::{GroupConfig, MatchConfig, MatchProgress, SortConfig};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Similarity(args) => run_similarity(args),
        Command::Sort(args) => run_sort(args),
        Command::Group(args) => run_group(args),
        Command::Dedup(args) => {
            let (written, dropped) = fileops::dedup_lines(&args.file, &args.output, args.encoding)
                .with_context(|| format!("deduplicating {}", args.file.display()))?;
            println!("Wrote {} unique lines, dropped {} duplicates", written, dropped);
            Ok(())
        }
        Command::Swap(args) => {
            let (written, dropped) =
                fileops::swap_fields(&args.file, &args.output, args.encoding, &args.separator)
                    .with_context(|| format!("swapping fields of {}", args.file.display()))?;
            println!("Wrote {} swapped lines, dropped {} malformed", written, dropped);
            Ok(())
        }
    }
}

fn run_similarity(args: SimilarityArgs) -> Result<()> {
    if let Err(e) = args.validate() {
        eprintln!("Invalid arguments: {}", e);
        std::process::exit(1);
    }

    println!("Similarity matching");
    println!("{}", "=".repeat(60));
    println!("  First file:     {}", args.file_a.display());
    println!("  Second file:    {}", args.file_b.display());
    println!("  Output file:    {}", args.output.display());
    println!(
        "  Separator:      {}",
        if args.separator == "\t" {
            "TAB"
        } else {
            args.separator.as_str()
        }
    );
    println!("  Encoding:       {}", args.encoding);
    println!("  Comparator:     {}", args.comparator);
    println!("  Threshold:      {}", args.threshold);
    if let Some(scope) = args.length_scope {
        println!("  Length scope:   +/-{}", scope);
    }
    println!();

    let config = MatchConfig {
        separator_a: args.separator.clone(),
        separator_b: args.separator.clone(),
        separator_out: args.separator.clone(),
        encoding: args.encoding,
        comparator: args.build_comparator(),
        split_size_a: args.split_size_a,
        split_size_b: args.split_size_b,
        length_scope: args.length_scope,
        multiplier: args.multiplier,
        deadline: args.deadline_secs.map(Duration::from_secs),
        cancel: None,
    };

    let report = if args.progress {
        let (sender, mut receiver) = tokio::sync::mpsc::channel::<MatchProgress>(64);
        let printer = std::thread::spawn(move || {
            while let Some(event) = receiver.blocking_recv() {
                match event {
                    MatchProgress::PairCompleted {
                        a_index,
                        b_index,
                        matched,
                    } => {
                        println!(
                            "  pair ({}, {}) finished: {} matches",
                            a_index, b_index, matched
                        );
                    }
                }
            }
        });
        let result = matcher::match_files_streaming(
            &args.file_a,
            &args.file_b,
            &args.output,
            &config,
            Some(sender),
        );
        let _ = printer.join();
        result?
    } else {
        matcher::match_files(&args.file_a, &args.file_b, &args.output, &config)?
    };

    println!("Matched {} record pairs", report.matched);
    println!(
        "  {} x {} partitions, {} threads, {:.2}s",
        report.partitions_a, report.partitions_b, report.threads, report.duration_secs
    );
    if report.dropped_a + report.dropped_b > 0 {
        println!(
            "  Skipped malformed lines: {} (first file), {} (second file)",
            report.dropped_a, report.dropped_b
        );
    }

    if let Some(path) = args.report {
        write_json_report(&report, &path)
            .with_context(|| format!("writing report to {}", path.display()))?;
        println!("  Report written to {}", path.display());
    }
    Ok(())
}

fn run_sort(args: SortArgs) -> Result<()> {
    println!("External field sort");
    println!("{}", "=".repeat(60));
    println!("  File:           {}", args.file.display());
    println!("  Field index:    {}", args.field_index);
    println!("  Encoding:       {}", args.encoding);
    println!("  Split size:     {} lines", args.split_size);
    println!();

    let config = SortConfig {
        separator: args.separator.clone(),
        field_index: args.field_index,
        allow_empty_field: args.allow_empty_field,
        split_size: args.split_size,
        encoding: args.encoding,
    };

    let report = match args.output {
        Some(ref output) => sorter::sort_file_to(&args.file, output, &config)?,
        None => sorter::sort_file(&args.file, &config)?,
    };

    println!(
        "Sorted {} lines across {} partitions in {:.2}s",
        report.sorted_lines, report.partitions, report.duration_secs
    );
    if report.dropped_malformed + report.dropped_empty_field > 0 {
        println!(
            "  Dropped {} malformed and {} empty-field lines",
            report.dropped_malformed, report.dropped_empty_field
        );
    }

    if let Some(path) = args.report {
        write_json_report(&report, &path)
            .with_context(|| format!("writing report to {}", path.display()))?;
        println!("  Report written to {}", path.display());
    }
    Ok(())
}

fn run_group(args: GroupArgs) -> Result<()> {
    println!("Transitive key grouping");
    println!("{}", "=".repeat(60));
    println!("  File:           {}", args.file.display());
    println!("  Output file:    {}", args.output.display());
    println!("  Encoding:       {}", args.encoding);
    println!();

    let config = GroupConfig {
        separator: args.separator.clone(),
        encoding: args.encoding,
    };
    let report = grouper::group_file(&args.file, &args.output, &config)?;

    println!(
        "Grouped {} rows into {} groups ({} singletons) in {:.2}s",
        report.rows, report.groups, report.singleton_groups, report.duration_secs
    );

    if let Some(path) = args.report {
        write_json_report(&report, &path)
            .with_context(|| format!("writing report to {}", path.display()))?;
        println!("  Report written to {}", path.display());
    }
    Ok(())
}
