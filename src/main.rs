// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! radiobridge - dialog-engine bridge to a radio content backend

mod cli;
mod output;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use radiobridge::logging::{init_logging, LogConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Completion scripts go to stdout untouched by log setup
    if let Commands::Completions { shell } = &cli.command {
        cli::completions::execute(shell.clone());
        return Ok(());
    }

    let mut log_config = LogConfig::from_env().verbose(cli.verbose);
    log_config.ansi = !cli.no_color;
    init_logging(log_config)?;

    match cli.command {
        Commands::Completions { .. } => {}
        Commands::Serve { bind } => {
            cli::serve::execute(cli.config.as_deref(), bind).await?;
        }
        Commands::Search {
            filter_type,
            field,
            size,
            min_score,
            sort_desc,
            output,
        } => {
            cli::search::execute(
                cli.config.as_deref(),
                cli::search::SearchArgs {
                    filter_type,
                    fields: field,
                    size,
                    min_score,
                    sort_desc,
                    output,
                    no_color: cli.no_color,
                },
            )
            .await?;
        }
    }

    Ok(())
}
