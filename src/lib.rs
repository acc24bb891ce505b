// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! radiobridge - dialog-engine bridge to a radio content backend
//!
//! - [`http`]: signed outbound requests and bound clients
//! - [`search`]: search document construction and hit normalization
//! - [`server`]: the dialog routes built on both

pub mod config;
pub mod http;
pub mod logging;
pub mod search;
pub mod server;
