// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CLI module - Command line interface definitions and handlers

pub mod completions;
pub mod search;
pub mod serve;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// radiobridge - dialog-engine bridge to a radio content backend
#[derive(Parser, Debug)]
#[command(name = "radiobridge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./radiobridge.toml when present)
    #[arg(short, long, global = true, env = "RADIOBRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the dialog routes
    Serve {
        /// Address to bind, overrides [server].bind
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Run one search against the backend and print normalized hits
    Search {
        /// Content type to search (presenters, programs, broadcasts, items)
        filter_type: String,

        /// Exact match on a field (FIELD=VALUE)
        #[arg(short, long, value_parser = parse_key_value)]
        field: Vec<(String, String)>,

        /// Maximum number of hits
        #[arg(long)]
        size: Option<u64>,

        /// Minimum relevance score
        #[arg(long)]
        min_score: Option<f64>,

        /// Sort on a field, newest first (e.g. start)
        #[arg(long)]
        sort_desc: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        output: OutputFormat,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

/// Parse KEY=VALUE pairs
fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no `=` found in `{s}`"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}
