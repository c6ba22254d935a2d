//! `view`: drive a full viewer session from the command line.

use super::{print_record, Output};
use crate::cli::ViewArgs;
use crate::filter::condition::{Condition, ConditionJoin, ConditionSet, MatchType};
use crate::filter::state::{FilterState, LevelSelection, TimeBounds};
use crate::protocol::{parse_target_time, Response};
use crate::session::{FilterOutcome, PageRow, RenderedPage, ViewerSession};
use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use std::time::Duration;

/// How long `view` waits for the loader to buffer the file before rendering.
const LOAD_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ViewOutput<'a> {
    file: &'a Response,
    page: &'a RenderedPage,
    #[serde(skip_serializing_if = "Option::is_none")]
    exported: Option<usize>,
}

fn filter_state(args: &ViewArgs) -> Result<FilterState> {
    let parse = |text: &Option<String>| -> Result<_> {
        text.as_deref()
            .map(parse_target_time)
            .transpose()
            .context("Invalid time bound")
    };
    let (start, end) = (parse(&args.since)?, parse(&args.until)?);
    Ok(FilterState {
        keyword: args.keyword.clone(),
        keyword_mode: args.mode.into(),
        thread_name: args.thread.clone(),
        class_name: args.class.clone(),
        method_name: args.method.clone(),
        levels: LevelSelection::new(&args.levels),
        time_range: Some(TimeBounds { start, end }),
        conditions: condition_set(args)?,
    }
    .normalized())
}

fn condition_set(args: &ViewArgs) -> Result<ConditionSet> {
    let conditions = args
        .conditions
        .iter()
        .map(|text| parse_condition(text))
        .collect::<Result<Vec<_>>>()?;
    let join = if args.any {
        ConditionJoin::Or
    } else {
        ConditionJoin::And
    };
    Ok(ConditionSet::new(join, conditions))
}

/// `FIELD=VALUE` (exact) or `FIELD~VALUE` (contains).
fn parse_condition(text: &str) -> Result<Condition> {
    let Some(split) = text.find(['=', '~']) else {
        anyhow::bail!("Condition '{}' needs FIELD=VALUE or FIELD~VALUE", text);
    };
    let (field, rest) = text.split_at(split);
    let match_type = if rest.starts_with('=') {
        MatchType::Exact
    } else {
        MatchType::Contains
    };
    let value = rest[1..].to_string();
    Ok(match field.trim().to_ascii_lowercase().as_str() {
        "keyword" => Condition::Keyword { value },
        "thread" => Condition::Thread { value, match_type },
        "class" => Condition::Class { value, match_type },
        "method" => Condition::Method { value, match_type },
        "level" => Condition::Level {
            levels: LevelSelection::new(value.split(',')),
        },
        other => anyhow::bail!(
            "Unknown condition field '{}' (expected keyword, thread, class, method or level)",
            other
        ),
    })
}

pub fn run(args: ViewArgs, out: &Output) -> Result<()> {
    let mut settings = out.settings.clone().without_delays();
    if let Some(page_size) = args.page_size {
        settings.page_size = page_size;
    }

    let (mut session, loaded) = ViewerSession::open(&args.file, settings)
        .with_context(|| format!("Failed to open {}", args.file.display()))?;

    let state = filter_state(&args)?;
    if session.set_filter(state)? == FilterOutcome::Deferred {
        log::info!("loading all of {} before filtering", session.name());
    }
    session.set_collapse(args.collapse);
    for event in session.wait_until_idle(LOAD_TIMEOUT) {
        if let Response::Error { message, .. } = event {
            anyhow::bail!("Background work failed: {}", message);
        }
    }

    match args.goto_line {
        Some(line) => {
            let resolution = session.jump_to_line(line)?;
            if !resolution.exact {
                eprintln!(
                    "{} line {} is not in the current view; showing page {}",
                    "warning:".yellow(),
                    line,
                    resolution.page
                );
            }
        }
        None => {
            session.go_to_page(args.page)?;
        }
    }
    let page = session.render_page();

    let exported = match &args.export {
        Some(path) => Some(
            session
                .export_view(path)
                .with_context(|| format!("Failed to export to {}", path.display()))?,
        ),
        None => None,
    };

    if out.json {
        let text = serde_json::to_string_pretty(&ViewOutput {
            file: &loaded,
            page: &page,
            exported,
        })
        .context("Failed to encode view")?;
        println!("{}", text);
        return Ok(());
    }

    show_page(&session, &page);
    if let (Some(count), Some(path)) = (exported, &args.export) {
        eprintln!(
            "{}",
            format!("exported {} lines to {}", count, path.display()).dimmed()
        );
    }
    Ok(())
}

fn show_page(session: &ViewerSession, page: &RenderedPage) {
    for row in &page.rows {
        match row {
            PageRow::Line(record) => print_record(record),
            PageRow::Group {
                pattern_length,
                repeat_count,
                first_line_number,
                last_line_number,
                pattern,
            } => {
                for record in pattern {
                    print_record(record);
                }
                println!(
                    "{}",
                    format!(
                        "         ... {} line block repeated {} times (lines {}-{})",
                        pattern_length, repeat_count, first_line_number, last_line_number
                    )
                    .cyan()
                );
            }
        }
    }

    let count = page.page_count;
    let pages = if count.estimated {
        format!("~{}", count.pages)
    } else {
        count.pages.to_string()
    };
    eprintln!(
        "{}",
        format!(
            "page {} of {} | {} of {} lines shown{}",
            page.page,
            pages,
            session.view().len(),
            session.total_lines(),
            if session.is_collapsed() { " | collapsed" } else { "" }
        )
        .dimmed()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ModeArg;
    use crate::filter::state::KeywordMode;
    use std::path::PathBuf;

    fn args() -> ViewArgs {
        ViewArgs {
            file: PathBuf::from("app.log"),
            keyword: Some("timeout".to_string()),
            mode: ModeArg::Regex,
            levels: vec!["warning".to_string()],
            thread: None,
            class: Some(" ".to_string()),
            method: None,
            since: Some("2024-01-01 10:00".to_string()),
            until: None,
            conditions: Vec::new(),
            any: false,
            collapse: false,
            page: 1,
            page_size: None,
            goto_line: None,
            export: None,
        }
    }

    #[test]
    fn test_filter_state_from_args() {
        let state = filter_state(&args()).unwrap();
        assert_eq!(state.keyword.as_deref(), Some("timeout"));
        assert_eq!(state.keyword_mode, KeywordMode::Regex);
        assert!(state.levels.contains_label("WARN"));
        assert_eq!(state.class_name, None);
        let bounds = state.time_range.unwrap();
        assert!(bounds.start.is_some());
        assert!(bounds.end.is_none());
    }

    #[test]
    fn test_bad_time_bound_rejected() {
        let mut bad = args();
        bad.until = Some("later".to_string());
        assert!(filter_state(&bad).is_err());
    }

    #[test]
    fn test_where_conditions_from_args() {
        let mut with_where = args();
        with_where.conditions = vec![
            "thread=main".to_string(),
            "class~Repo".to_string(),
            "level=error,warn".to_string(),
        ];
        with_where.any = true;
        let state = filter_state(&with_where).unwrap();
        assert_eq!(state.conditions.join, ConditionJoin::Or);
        assert_eq!(
            state.conditions.conditions[..2],
            [
                Condition::Thread {
                    value: "main".to_string(),
                    match_type: MatchType::Exact,
                },
                Condition::Class {
                    value: "Repo".to_string(),
                    match_type: MatchType::Contains,
                },
            ]
        );
        assert!(matches!(
            &state.conditions.conditions[2],
            Condition::Level { levels } if levels.len() == 2
        ));
    }

    #[test]
    fn test_bad_where_condition_rejected() {
        let mut bad = args();
        bad.conditions = vec!["host=web-1".to_string()];
        assert!(filter_state(&bad).is_err());
        bad.conditions = vec!["thread".to_string()];
        assert!(filter_state(&bad).is_err());
    }
}
