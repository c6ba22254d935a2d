//! Command-line definitions for biglog.

use crate::filter::state::KeywordMode;
use crate::mutate::CutMode;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "biglog")]
#[command(version)]
#[command(about = "Browse, search, filter, collapse and trim very large log files", long_about = None)]
pub struct Cli {
    /// More log output on stderr (repeat for trace)
    #[arg(short = 'v', long = "verbose", global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short = 'q', long = "quiet", global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print protocol responses as JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print a range of lines
    Lines(LinesArgs),

    /// Find lines containing a keyword
    Search(SearchArgs),

    /// Show lines with the given levels (ERROR, WARN, INFO, DEBUG, OTHER)
    Levels(LevelsArgs),

    /// Level counts, time range and the most frequent threads, classes and methods
    Stats(StatsArgs),

    /// Sample timestamps across the file and bucket them by level
    Timeline(TimelineArgs),

    /// Show the lines around the first record at or after a time
    FindTime(FindTimeArgs),

    /// List the lines a cut would keep or remove, without touching the file
    Preview(CutArgs),

    /// Remove lines before or after a time or line number (rewrites the file)
    Delete(DeleteArgs),

    /// Filter, collapse and page through the file
    View(ViewArgs),

    /// Serve the request/response protocol over HTTP
    Serve(ServeArgs),

    /// Config file commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args, Debug)]
pub struct LinesArgs {
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// First line to print (1-based)
    #[arg(long, default_value_t = 1)]
    pub from: usize,

    /// Number of lines
    #[arg(short = 'n', long, default_value_t = 20)]
    pub count: usize,
}

/// Keyword matching mode.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModeArg {
    #[default]
    Plain,
    Regex,
    /// Every whitespace-separated word must occur
    All,
}

impl From<ModeArg> for KeywordMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Plain => KeywordMode::Plain,
            ModeArg::Regex => KeywordMode::Regex,
            ModeArg::All => KeywordMode::MultiAnd,
        }
    }
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    #[arg(value_name = "KEYWORD")]
    pub keyword: String,

    #[arg(long, value_enum, default_value_t = ModeArg::Plain)]
    pub mode: ModeArg,

    /// Print the lines that do not match
    #[arg(long)]
    pub reverse: bool,
}

#[derive(Args, Debug)]
pub struct LevelsArgs {
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    #[arg(value_name = "LEVEL", required = true)]
    pub levels: Vec<String>,
}

#[derive(Args, Debug)]
pub struct StatsArgs {
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Entries per frequency table (defaults to the configured top_n)
    #[arg(long)]
    pub top: Option<usize>,
}

#[derive(Args, Debug)]
pub struct TimelineArgs {
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Number of samples (defaults to the configured timeline_sample_points)
    #[arg(long)]
    pub samples: Option<usize>,

    /// Number of time buckets (defaults to the configured timeline_buckets)
    #[arg(long)]
    pub buckets: Option<usize>,
}

#[derive(Args, Debug)]
pub struct FindTimeArgs {
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Target time, e.g. "2024-03-01 10:00:00"
    #[arg(value_name = "TIME")]
    pub time: String,
}

/// Where a cut is made and which side goes.
#[derive(Args, Debug)]
#[command(group(clap::ArgGroup::new("side").required(true).args(["before", "after"])))]
#[command(group(clap::ArgGroup::new("boundary").required(true).args(["time", "line"])))]
pub struct CutArgs {
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Cut everything before the boundary
    #[arg(long)]
    pub before: bool,

    /// Cut everything after the boundary
    #[arg(long)]
    pub after: bool,

    /// Boundary time; lines without a timestamp are always kept
    #[arg(long, value_name = "TIME")]
    pub time: Option<String>,

    /// Boundary line number (1-based, kept)
    #[arg(long, value_name = "LINE")]
    pub line: Option<usize>,

    /// List the lines that would be removed instead of those kept
    #[arg(long)]
    pub removed: bool,

    /// Write the listed lines to this file instead of printing them
    #[arg(short = 'o', long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

impl CutArgs {
    pub fn mode(&self) -> CutMode {
        if self.after {
            CutMode::After
        } else {
            CutMode::Before
        }
    }
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    #[command(flatten)]
    pub cut: CutArgs,

    /// Rewrite the file without asking
    #[arg(short = 'y', long)]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct ViewArgs {
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Keyword filter
    #[arg(short = 'k', long)]
    pub keyword: Option<String>,

    #[arg(long, value_enum, default_value_t = ModeArg::Plain)]
    pub mode: ModeArg,

    /// Level filter (repeatable)
    #[arg(short = 'l', long = "level", value_name = "LEVEL")]
    pub levels: Vec<String>,

    /// Exact thread name
    #[arg(long)]
    pub thread: Option<String>,

    /// Class name substring
    #[arg(long)]
    pub class: Option<String>,

    /// Exact method name
    #[arg(long)]
    pub method: Option<String>,

    /// Earliest timestamp to show (inclusive)
    #[arg(long, value_name = "TIME")]
    pub since: Option<String>,

    /// Latest timestamp to show (inclusive)
    #[arg(long, value_name = "TIME")]
    pub until: Option<String>,

    /// Advanced condition, repeatable: FIELD=VALUE for an exact match or
    /// FIELD~VALUE for a case-insensitive substring. FIELD is keyword,
    /// thread, class, method or level (comma-separated labels)
    #[arg(short = 'w', long = "where", value_name = "CONDITION")]
    pub conditions: Vec<String>,

    /// Join --where conditions with OR instead of AND
    #[arg(long)]
    pub any: bool,

    /// Fold repeated line blocks into one row
    #[arg(short = 'c', long)]
    pub collapse: bool,

    #[arg(short = 'p', long, default_value_t = 1)]
    pub page: usize,

    /// Records per page (defaults to the configured page_size)
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Show the page containing this line number instead of --page
    #[arg(long, value_name = "LINE", conflicts_with = "page")]
    pub goto_line: Option<usize>,

    /// Write the filtered lines to this file
    #[arg(long, value_name = "PATH")]
    pub export: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Bind host
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Bind port
    #[arg(short = 'p', long, default_value_t = 8422)]
    pub port: u16,
}

/// Config subcommand actions.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the config file
    Validate,
    /// Show effective configuration
    Show,
}
