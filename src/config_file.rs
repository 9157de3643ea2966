use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::Args;

/// JSON configuration file format
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    pub input_path: Option<String>,
    pub output_path: Option<String>,
    pub bounds: Option<String>,
    pub max_size: Option<u32>,
    pub extensions: Option<String>,
    pub jobs: Option<usize>,
    pub verbose: Option<bool>,
    pub dry_run: Option<bool>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}

/// Flags that consume the following argument as their value
const VALUE_FLAGS: &[(Option<&str>, &str)] = &[
    (Some("-i"), "--input"),
    (Some("-o"), "--output"),
    (Some("-b"), "--bounds"),
    (Some("-m"), "--max-size"),
    (None, "--extensions"),
    (Some("-j"), "--jobs"),
    (Some("-c"), "--config"),
];

/// `arg` is `long`, `long=value`, `short` or `short` with an attached value
fn matches_flag(arg: &str, short: Option<&str>, long: &str) -> bool {
    if arg == long || arg.strip_prefix(long).is_some_and(|rest| rest.starts_with('=')) {
        return true;
    }
    short.is_some_and(|s| {
        arg == s
            || arg
                .strip_prefix(s)
                .and_then(|rest| rest.chars().next())
                .is_some_and(|c| c != '-')
    })
}

/// Whether `flag` (e.g. `--output` or `-o`) was given on the command line
///
/// Only flag positions are inspected: values of other flags and everything
/// after `--` are skipped.
fn flag_present(cli_args: &[String], short: Option<&str>, long: &str) -> bool {
    let mut args = cli_args.iter().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--" {
            break;
        }
        if matches_flag(arg, short, long) {
            return true;
        }
        let takes_value = VALUE_FLAGS
            .iter()
            .any(|(s, l)| arg == l || s.is_some_and(|s| arg == s));
        if takes_value {
            args.next();
        }
    }
    false
}

impl Args {
    /// Load configuration from a JSON file and merge with command-line arguments
    /// Command-line arguments take precedence over config file values
    pub fn load_and_merge_config(&mut self) -> Result<()> {
        if let Some(config_path) = self.config_file.clone() {
            let config = ConfigFile::load(&config_path)?;
            let cli_args = std::env::args().collect::<Vec<_>>();
            self.merge_from_config(config, &cli_args);
        }
        Ok(())
    }

    pub fn merge_from_config(&mut self, config: ConfigFile, cli_args: &[String]) {
        if !flag_present(cli_args, Some("-i"), "--input") {
            if let Some(input) = config.input_path {
                self.input_paths = vec![PathBuf::from(input)];
            }
        }

        if !flag_present(cli_args, Some("-o"), "--output") {
            if let Some(output) = config.output_path {
                self.output_dir = PathBuf::from(output);
            }
        }

        if !flag_present(cli_args, Some("-b"), "--bounds") {
            if let Some(bounds) = config.bounds {
                self.bounds = bounds;
            }
        }

        if !flag_present(cli_args, Some("-m"), "--max-size") && config.max_size.is_some() {
            self.max_size = config.max_size;
        }

        if !flag_present(cli_args, None, "--extensions") {
            if let Some(extensions) = config.extensions {
                self.extensions_str = extensions;
            }
        }

        if !flag_present(cli_args, Some("-j"), "--jobs") {
            if let Some(jobs) = config.jobs {
                self.jobs = jobs;
            }
        }

        // Boolean switches can only be turned on from the file
        if config.verbose.unwrap_or(false) {
            self.verbose = true;
        }
        if config.dry_run.unwrap_or(false) {
            self.dry_run = true;
        }
    }
}
