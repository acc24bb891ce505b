// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Serve the dialog routes

use anyhow::Result;
use radiobridge::config::Config;
use radiobridge::server::run_server;
use std::path::Path;

pub async fn execute(config_path: Option<&Path>, bind: Option<String>) -> Result<()> {
    let mut config = Config::load(config_path)?;
    if let Some(bind) = bind {
        config.server.bind = bind;
    }

    run_server(&config).await
}
