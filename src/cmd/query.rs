//! Read-only commands: lines, search, levels, stats, timeline, find-time.

use super::{open, print_json, print_records, run_request, summary_line, Output};
use crate::cli::{FindTimeArgs, LevelsArgs, LinesArgs, SearchArgs, StatsArgs, TimelineArgs};
use crate::filter::state::LevelSelection;
use crate::protocol::{Request, Response};
use crate::stats::timeline::{bucketize, TimelineData};
use crate::stats::{FrequencyEntry, StatisticsSummary};
use anyhow::Result;
use colored::Colorize;

pub fn lines(args: LinesArgs, out: &Output) -> Result<()> {
    let scanner = open(&args.file)?;
    let request = Request::ReadLines {
        start: args.from.saturating_sub(1),
        count: args.count,
    };
    let response = run_request(&scanner, request, &out.settings)?;
    if out.json {
        return print_json(&response);
    }
    if let Response::MoreLines { lines, .. } = &response {
        print_records(lines);
    }
    Ok(())
}

pub fn search(args: SearchArgs, out: &Output) -> Result<()> {
    let scanner = open(&args.file)?;
    let request = Request::Search {
        keyword: args.keyword,
        mode: args.mode.into(),
        reverse: args.reverse,
    };
    let response = run_request(&scanner, request, &out.settings)?;
    if out.json {
        return print_json(&response);
    }
    if let Response::SearchResults { keyword, results } = &response {
        print_records(results);
        eprintln!(
            "{}",
            format!("{} lines matched '{}'", results.len(), keyword).dimmed()
        );
    }
    Ok(())
}

pub fn levels(args: LevelsArgs, out: &Output) -> Result<()> {
    let scanner = open(&args.file)?;
    let request = Request::FilterByLevel {
        levels: LevelSelection::new(&args.levels),
    };
    let response = run_request(&scanner, request, &out.settings)?;
    if out.json {
        return print_json(&response);
    }
    if let Response::FilterResults { results, .. } = &response {
        print_records(results);
    }
    Ok(())
}

pub fn stats(args: StatsArgs, out: &Output) -> Result<()> {
    let scanner = open(&args.file)?;
    let mut settings = out.settings.clone();
    if let Some(top) = args.top {
        settings.top_n = top;
    }
    let response = run_request(&scanner, Request::GetStatistics, &settings)?;
    if out.json {
        return print_json(&response);
    }
    if let Response::StatisticsResults(summary) = &response {
        show_statistics(summary);
    }
    Ok(())
}

fn show_statistics(summary: &StatisticsSummary) {
    summary_line("lines", summary.total_lines);
    println!(
        "{}: {} {}  {} {}  {} {}  {} {}  {} {}",
        "levels".cyan(),
        "ERROR".red(),
        summary.error_count,
        "WARN".yellow(),
        summary.warn_count,
        "INFO".normal(),
        summary.info_count,
        "DEBUG".dimmed(),
        summary.debug_count,
        "OTHER".dimmed(),
        summary.other_count
    );
    match summary.time_range {
        Some(range) => summary_line("time range", format!("{} .. {}", range.start, range.end)),
        None => println!("{}: {}", "time range".cyan(), "(no timestamps)".dimmed()),
    }
    show_table("threads", &summary.top_threads);
    show_table("classes", &summary.top_classes);
    show_table("methods", &summary.top_methods);
}

fn show_table(title: &str, entries: &[FrequencyEntry]) {
    if entries.is_empty() {
        return;
    }
    println!();
    println!("{}:", title.cyan());
    for entry in entries {
        println!("  {:>8}  {}", entry.count, entry.name.green());
    }
}

pub fn timeline(args: TimelineArgs, out: &Output) -> Result<()> {
    let scanner = open(&args.file)?;
    let request = Request::SampleTimeline {
        samples: args.samples,
    };
    let response = run_request(&scanner, request, &out.settings)?;
    if out.json {
        return print_json(&response);
    }
    if let Response::TimelineData(data) = &response {
        show_timeline(data, args.buckets.unwrap_or(out.settings.timeline_buckets));
    }
    Ok(())
}

fn show_timeline(data: &TimelineData, bucket_count: usize) {
    let (Some(start), Some(end)) = (data.start_time, data.end_time) else {
        println!("{}", "(no timestamps)".dimmed());
        return;
    };
    summary_line("samples", data.samples.len());
    summary_line("time range", format!("{} .. {}", start, end));

    let Some(buckets) = bucketize(data, bucket_count) else {
        println!("{}", "(time span too short to bucket)".dimmed());
        return;
    };
    let widest = buckets.iter().map(|b| b.counts.total()).max().unwrap_or(0).max(1);
    for bucket in &buckets {
        let counts = bucket.counts;
        let width = |n: usize| (n * 40).div_ceil(widest);
        println!(
            "{} {}{}{}{}",
            bucket.start.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
            "#".repeat(width(counts.error)).red(),
            "#".repeat(width(counts.warn)).yellow(),
            "#".repeat(width(counts.info)).normal(),
            "#".repeat(width(counts.debug + counts.other)).dimmed(),
        );
    }
}

pub fn find_time(args: FindTimeArgs, out: &Output) -> Result<()> {
    let scanner = open(&args.file)?;
    let mut settings = out.settings.clone();
    // A screenful around the target rather than a full viewer window.
    settings.initial_window = settings.page_size;
    let response = run_request(&scanner, Request::JumpToTime { time: args.time }, &settings)?;
    if out.json {
        return print_json(&response);
    }
    if let Response::JumpToTimeResult {
        success,
        target_line_number,
        lines,
        ..
    } = &response
    {
        match (success, target_line_number) {
            (true, Some(target)) => {
                summary_line("first line at or after", target);
                print_records(lines);
            }
            _ => println!("{}", "No line at or after that time.".dimmed()),
        }
    }
    Ok(())
}
