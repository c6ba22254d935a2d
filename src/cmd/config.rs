//! `config validate` and `config show`.
//!
//! Both look at a single file: the project `biglog.yaml` when one is found,
//! otherwise the global config.

use crate::config::{self, Settings};
use colored::Colorize;
use std::path::PathBuf;

fn effective_config_path() -> Option<PathBuf> {
    config::discover().closest().map(PathBuf::from)
}

/// Validate the effective config file.
///
/// Quiet on success; prints a Cargo-style error and returns 1 on failure.
pub fn validate() -> Result<(), i32> {
    let config_path = match effective_config_path() {
        Some(path) => path,
        None => {
            eprintln!("error: No config found to validate");
            return Err(1);
        }
    };

    match config::load_single_file(&config_path) {
        Ok(_) => Ok(()),
        Err(e) => {
            eprintln!("{}", e);
            Err(1)
        }
    }
}

/// Show the effective settings and where they came from.
pub fn show() -> Result<(), i32> {
    match effective_config_path() {
        Some(path) => match config::load_single_file(&path) {
            Ok(settings) => {
                println!("Using: {}", path.display().to_string().dimmed());
                println!();
                show_settings(&settings);
                Ok(())
            }
            Err(e) => {
                eprintln!("{}", e);
                Err(1)
            }
        },
        None => {
            println!("{}", "No config found. Using defaults.".dimmed());
            println!();
            show_settings(&Settings::default());
            Ok(())
        }
    }
}

fn show_settings(settings: &Settings) {
    let defaults = Settings::default();
    let rows = settings_rows(settings);
    let default_rows = settings_rows(&defaults);
    for ((name, value), (_, default)) in rows.iter().zip(default_rows.iter()) {
        if value == default {
            println!("{}: {}", name.cyan(), value.dimmed());
        } else {
            println!("{}: {}", name.cyan(), value.green());
        }
    }
}

fn settings_rows(settings: &Settings) -> Vec<(String, String)> {
    match serde_json::to_value(settings) {
        Ok(serde_json::Value::Object(map)) => map
            .into_iter()
            .map(|(key, value)| (key, value.to_string()))
            .collect(),
        _ => Vec::new(),
    }
}
