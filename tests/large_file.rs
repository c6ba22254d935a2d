use biglog::config::Settings;
use biglog::filter::state::FilterState;
use biglog::mutate::CutMode;
use biglog::protocol::{dispatch, Request, Response};
use biglog::reader::LineScanner;
use biglog::session::{FilterOutcome, PageRow, ViewerSession};
use serde_json::json;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

/// 10,000 lines: 100 distinct startup lines, 5,000 identical heartbeats
/// with moving timestamps, then 4,900 distinct lines with every tenth an ERROR.
fn big_log() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for i in 1..=10_000usize {
        let (h, m, s) = (i / 3600 % 24, i / 60 % 60, i % 60);
        let line = if i <= 100 {
            format!("2024-05-01 {:02}:{:02}:{:02} INFO [main] startup step {}", h, m, s, i)
        } else if i <= 5_100 {
            format!("2024-05-01 {:02}:{:02}:{:02} DEBUG [tick] heartbeat ok", h, m, s)
        } else if i % 10 == 0 {
            format!("2024-05-01 {:02}:{:02}:{:02} ERROR [worker] job {} failed", h, m, s, i)
        } else {
            format!("2024-05-01 {:02}:{:02}:{:02} INFO [worker] job {} done", h, m, s, i)
        };
        writeln!(file, "{}", line).unwrap();
    }
    file.flush().unwrap();
    file
}

fn settings() -> Settings {
    Settings {
        full_load_threshold: 2_000,
        initial_window: 1_000,
        chunk_size: 2_500,
        ..Settings::default()
    }
    .without_delays()
}

#[test]
fn read_lines_near_end_is_clipped() {
    let file = big_log();
    let scanner = LineScanner::open(file.path()).unwrap();
    let request: Request = serde_json::from_value(json!({
        "command": "readLines",
        "data": {"start": 9_990, "count": 100}
    }))
    .unwrap();

    match dispatch(&scanner, request, &settings()).unwrap() {
        Response::MoreLines { start_line, lines } => {
            assert_eq!(start_line, 9_990);
            assert_eq!(lines.len(), 10);
            assert_eq!(lines[9].line_number, 10_000);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn delete_partitions_the_file() {
    let file = big_log();
    let scanner = LineScanner::open(file.path()).unwrap();
    let response = dispatch(
        &scanner,
        Request::DeleteByLine {
            target: 5_101,
            mode: CutMode::Before,
        },
        &settings(),
    )
    .unwrap();

    match response {
        Response::MutationComplete {
            kept,
            deleted,
            total_lines,
        } => {
            assert_eq!(kept + deleted, 10_000);
            assert_eq!(deleted, 5_100);
            assert_eq!(total_lines, kept);
        }
        other => panic!("unexpected {:?}", other),
    }
    let first = scanner.read_range(0, 1).unwrap();
    assert!(first[0].content.contains("job 5101"));
}

#[test]
fn session_streams_then_collapses_heartbeats() {
    let file = big_log();
    let (mut session, loaded) = ViewerSession::open(file.path(), settings()).unwrap();
    assert!(matches!(
        loaded,
        Response::FileLoaded {
            total_lines: 10_000,
            all_loaded: false,
            ..
        }
    ));

    session.set_collapse(true);
    let events = session.wait_until_idle(Duration::from_secs(60));
    assert!(!events
        .iter()
        .any(|e| matches!(e, Response::Error { .. })));
    assert!(session.is_fully_loaded());
    assert_eq!(session.view().len(), 10_000);

    let count = session.page_count();
    assert!(!count.estimated);
    assert!(count.pages < 100, "collapse should shrink {} pages", count.pages);

    let mut expanded = 0;
    let mut next_start = 0;
    let mut saw_heartbeat_group = false;
    for page in 1..=count.pages {
        let range = session.go_to_page(page).unwrap();
        assert_eq!(range.start, next_start);
        next_start = range.end;

        for row in session.render_page().rows {
            match row {
                PageRow::Line(_) => expanded += 1,
                PageRow::Group {
                    pattern_length,
                    repeat_count,
                    pattern,
                    ..
                } => {
                    expanded += pattern_length * repeat_count;
                    if pattern[0].content.contains("heartbeat") {
                        saw_heartbeat_group = true;
                    }
                }
            }
        }
    }
    assert_eq!(next_start, 10_000);
    assert_eq!(expanded, 10_000);
    assert!(saw_heartbeat_group);
    assert!(session.go_to_page(count.pages + 1).is_err());
}

#[test]
fn session_level_filter_over_whole_file() {
    let file = big_log();
    let (mut session, _) = ViewerSession::open(file.path(), settings()).unwrap();

    let outcome = session
        .set_filter(FilterState::default().with_levels(["ERROR"]))
        .unwrap();
    if outcome == FilterOutcome::Deferred {
        session.wait_until_idle(Duration::from_secs(60));
    }
    assert!(!session.is_filter_pending());
    assert_eq!(session.view().len(), 490);
    assert!(session
        .view()
        .records()
        .iter()
        .all(|r| r.content.contains("ERROR")));

    session.clear_filters().unwrap();
    assert_eq!(session.view().len(), 10_000);
    assert!(!session.view().is_filtered());
}
