//! Destructive trimming of the log file and export of record lists.
//!
//! Deletion streams the survivors into `<file>.tmp` next to the original and
//! then renames it over the original. A failure before the rename leaves the
//! original untouched.

use crate::error::{Result, ViewerError};
use crate::reader::extract;
use crate::reader::LineScanner;
use crate::record::LogRecord;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::borrow::{Borrow, Cow};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::ops::ControlFlow;
use std::path::{Component, Path, PathBuf};

/// Which side of a boundary is cut away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CutMode {
    /// Remove everything before the boundary.
    Before,
    /// Remove everything after the boundary.
    After,
}

/// Decides whether a line survives a deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepRule {
    /// Lines without a timestamp always survive. The boundary itself survives.
    ByTime { target: NaiveDateTime, mode: CutMode },
    /// `line` is 1-based and survives.
    ByLine { line: usize, mode: CutMode },
}

impl KeepRule {
    pub fn keeps(&self, line_number: usize, content: &str) -> bool {
        match *self {
            KeepRule::ByTime { target, mode } => match extract::extract_timestamp(content) {
                None => true,
                Some(ts) => match mode {
                    CutMode::Before => ts >= target,
                    CutMode::After => ts <= target,
                },
            },
            KeepRule::ByLine { line, mode } => match mode {
                CutMode::Before => line_number >= line,
                CutMode::After => line_number <= line,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationOutcome {
    pub kept: usize,
    pub deleted: usize,
}

pub struct FileMutator {
    scanner: LineScanner,
}

impl FileMutator {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            scanner: LineScanner::new(path),
        }
    }

    pub fn path(&self) -> &Path {
        self.scanner.path()
    }

    /// Rewrite the file keeping only lines accepted by `rule`.
    ///
    /// Kept lines are written byte for byte, each terminated by `\n`.
    pub fn delete(&self, rule: &KeepRule) -> Result<MutationOutcome> {
        let path = self.path();
        let tmp = temp_path(path);

        let outcome = match self.write_survivors(&tmp, rule) {
            Ok(outcome) => outcome,
            Err(err) => {
                let _ = fs::remove_file(&tmp);
                return Err(err);
            }
        };

        if let Err(err) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(ViewerError::io(path, err));
        }

        log::info!(
            "trimmed {}: deleted {} lines, kept {}",
            path.display(),
            outcome.deleted,
            outcome.kept
        );
        Ok(outcome)
    }

    fn write_survivors(&self, tmp: &Path, rule: &KeepRule) -> Result<MutationOutcome> {
        let file = File::create(tmp).map_err(|e| ViewerError::io(tmp, e))?;
        let mut writer = BufWriter::new(file);
        let mut outcome = MutationOutcome { kept: 0, deleted: 0 };

        self.scanner.for_each_raw_line(|index, bytes| {
            let text: Cow<'_, str> = String::from_utf8_lossy(bytes);
            if rule.keeps(index + 1, &text) {
                writer
                    .write_all(bytes)
                    .and_then(|_| writer.write_all(b"\n"))
                    .map_err(|e| ViewerError::io(tmp, e))?;
                outcome.kept += 1;
            } else {
                outcome.deleted += 1;
            }
            Ok(ControlFlow::Continue(()))
        })?;

        let file = writer
            .into_inner()
            .map_err(|e| ViewerError::io(tmp, e.into_error()))?;
        file.sync_all().map_err(|e| ViewerError::io(tmp, e))?;
        Ok(outcome)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Resolve a requested export path against the directory of `viewed`.
///
/// Only plain relative paths are accepted, so an export always lands in that
/// directory or below it, and never on the viewed file itself.
pub fn export_target(viewed: &Path, requested: &Path) -> Result<PathBuf> {
    let plain = requested
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !plain || requested.file_name().is_none() {
        return Err(ViewerError::InvalidArgument(format!(
            "export path '{}' must be a relative path without '..'",
            requested.display()
        )));
    }
    let relative: PathBuf = requested
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect();
    if viewed.file_name() == Some(relative.as_os_str()) {
        return Err(ViewerError::InvalidArgument(
            "export would overwrite the viewed file".to_string(),
        ));
    }
    let dir = viewed
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    Ok(dir.join(relative))
}

/// Write each record's content followed by a newline. Returns the record count.
pub fn export_records<I>(records: I, path: &Path) -> Result<usize>
where
    I: IntoIterator,
    I::Item: Borrow<LogRecord>,
{
    let file = File::create(path).map_err(|e| ViewerError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    let mut count = 0;
    for record in records {
        writeln!(writer, "{}", record.borrow().content).map_err(|e| ViewerError::io(path, e))?;
        count += 1;
    }
    writer.flush().map_err(|e| ViewerError::io(path, e))?;
    log::info!("exported {} lines to {}", count, path.display());
    Ok(count)
}
