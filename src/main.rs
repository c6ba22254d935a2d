use anyhow::Result;
use biglog::cli::{Cli, Commands, ConfigAction};
use biglog::cmd::{self, Output};
use biglog::config;
use clap::Parser;
use env_logger::{Builder, Env, Target};
use log::LevelFilter;

fn init_logging(cli: &Cli) {
    let mut builder = Builder::from_env(Env::default().default_filter_or("warn"));
    if cli.quiet {
        builder.filter_level(LevelFilter::Error);
    } else if cli.verbose == 1 {
        builder.filter_level(LevelFilter::Debug);
    } else if cli.verbose > 1 {
        builder.filter_level(LevelFilter::Trace);
    }
    builder.target(Target::Stderr).init();
}

fn load_settings() -> std::result::Result<config::Settings, i32> {
    let discovery = config::discover();
    if !discovery.has_config() {
        log::debug!("no config file found; using default settings");
    }
    config::load(&discovery).map_err(|e| {
        eprintln!("{}", e);
        1
    })
}

fn run(cli: Cli) -> Result<(), i32> {
    let command = match cli.command {
        Commands::Config { action } => {
            return match action {
                ConfigAction::Validate => cmd::config::validate(),
                ConfigAction::Show => cmd::config::show(),
            };
        }
        command => command,
    };

    let settings = load_settings()?;
    if let Commands::Serve(args) = command {
        return biglog::web::run(args, settings);
    }

    let out = Output {
        json: cli.json,
        settings,
    };
    let result: Result<()> = match command {
        Commands::Lines(args) => cmd::query::lines(args, &out),
        Commands::Search(args) => cmd::query::search(args, &out),
        Commands::Levels(args) => cmd::query::levels(args, &out),
        Commands::Stats(args) => cmd::query::stats(args, &out),
        Commands::Timeline(args) => cmd::query::timeline(args, &out),
        Commands::FindTime(args) => cmd::query::find_time(args, &out),
        Commands::Preview(args) => cmd::cut::preview(args, &out),
        Commands::Delete(args) => cmd::cut::delete(args, &out),
        Commands::View(args) => cmd::view::run(args, &out),
        Commands::Serve(_) | Commands::Config { .. } => Ok(()),
    };

    result.map_err(|err| {
        eprintln!("error: {:#}", err);
        1
    })
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    if let Err(code) = run(cli) {
        std::process::exit(code);
    }
}
