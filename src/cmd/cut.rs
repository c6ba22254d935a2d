//! `preview` and `delete`: cutting a file before or after a boundary.

use super::{open, print_json, print_records, run_request, summary_line, Output};
use crate::cli::{CutArgs, DeleteArgs};
use crate::mutate::export_records;
use crate::protocol::{Request, Response};
use anyhow::{bail, Context, Result};
use colored::Colorize;

fn preview_request(args: &CutArgs, keep: bool) -> Result<Request> {
    let mode = args.mode();
    match (&args.time, args.line) {
        (Some(time), None) => Ok(Request::FilterByTime {
            target: time.clone(),
            mode,
            keep,
        }),
        (None, Some(line)) => Ok(Request::FilterByLine {
            target: line,
            mode,
            keep,
        }),
        _ => bail!("exactly one of --time or --line is required"),
    }
}

fn delete_request(args: &CutArgs) -> Result<Request> {
    let mode = args.mode();
    match (&args.time, args.line) {
        (Some(time), None) => Ok(Request::DeleteByTime {
            target: time.clone(),
            mode,
        }),
        (None, Some(line)) => Ok(Request::DeleteByLine { target: line, mode }),
        _ => bail!("exactly one of --time or --line is required"),
    }
}

pub fn preview(args: CutArgs, out: &Output) -> Result<()> {
    let scanner = open(&args.file)?;
    let request = preview_request(&args, !args.removed)?;
    let response = run_request(&scanner, request, &out.settings)?;

    let Response::PreviewResults { results, .. } = &response else {
        return print_json(&response);
    };

    if let Some(path) = &args.output {
        let count = export_records(results, path)
            .with_context(|| format!("Failed to export to {}", path.display()))?;
        if out.json {
            return print_json(&Response::ExportComplete {
                path: path.clone(),
                count,
            });
        }
        summary_line("exported", format!("{} lines to {}", count, path.display()));
        return Ok(());
    }

    if out.json {
        return print_json(&response);
    }
    print_records(results);
    Ok(())
}

pub fn delete(args: DeleteArgs, out: &Output) -> Result<()> {
    let scanner = open(&args.cut.file)?;

    if !args.yes {
        let doomed = run_request(&scanner, preview_request(&args.cut, false)?, &out.settings)?;
        if let Response::PreviewResults { results, .. } = &doomed {
            eprintln!(
                "{} would remove {} lines from {}; rerun with --yes to rewrite the file",
                "note:".yellow(),
                results.len(),
                scanner.path().display()
            );
        }
        bail!("not confirmed");
    }

    let response = run_request(&scanner, delete_request(&args.cut)?, &out.settings)?;
    if out.json {
        return print_json(&response);
    }
    if let Response::MutationComplete { kept, deleted, .. } = response {
        summary_line("deleted", deleted);
        summary_line("kept", kept);
    }
    Ok(())
}
