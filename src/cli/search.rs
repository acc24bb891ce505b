// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! One-off search from the command line

use super::OutputFormat;
use crate::output::{JsonFormatter, OutputFormatter, TableFormatter};
use anyhow::{Context, Result};
use radiobridge::config::Config;
use radiobridge::http::BoundClient;
use radiobridge::search::{search, SearchOptions};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Instant;

pub struct SearchArgs {
    pub filter_type: String,
    pub fields: Vec<(String, String)>,
    pub size: Option<u64>,
    pub min_score: Option<f64>,
    pub sort_desc: Option<String>,
    pub output: OutputFormat,
    pub no_color: bool,
}

pub async fn execute(config_path: Option<&Path>, args: SearchArgs) -> Result<()> {
    let config = Config::load(config_path)?;
    let client = BoundClient::new(config.client_options()?)?;

    let options = search_options(&args);
    let fields: Vec<(&str, Value)> = args
        .fields
        .iter()
        .map(|(k, v)| (k.as_str(), Value::String(v.clone())))
        .collect();

    let start = Instant::now();
    let records = search(&client, &args.filter_type, &fields, &options)
        .await
        .with_context(|| format!("Search for '{}' failed", args.filter_type))?;

    let formatter: Box<dyn OutputFormatter> = match args.output {
        OutputFormat::Table => Box::new(TableFormatter::new(!args.no_color)),
        OutputFormat::Json => Box::new(JsonFormatter::new()),
    };
    println!("{}", formatter.format(&records, start.elapsed()));

    Ok(())
}

fn search_options(args: &SearchArgs) -> SearchOptions {
    let mut options = SearchOptions::new();
    if let Some(size) = args.size {
        options = options.size(size);
    }
    if let Some(min_score) = args.min_score {
        options = options.min_score(min_score);
    }
    if let Some(field) = &args.sort_desc {
        options = options.sort(json!({ field.as_str(): { "order": "desc" } }));
    }
    options
}
