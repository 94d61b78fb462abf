// This file is part of soroban-indexer.
// Copyright (C) 2025 Blockroma
// SPDX-License-Identifier: Apache-2.0
// Licensed under the Apache License, Version 2.0 (the "License");
// You may not use this file except in compliance with the License.
// You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

pub mod api;
pub mod node;
pub mod storage;

use serde::Deserialize;

/// Infrastructure configuration: the node, the store, and the HTTP surface.
///
/// The storage DSN defaults to empty and must be supplied via configuration or the
/// `POSTGRES_DSN` environment variable; the launcher refuses to start without it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(rename = "node", default)]
    pub node_config: node::Config,

    #[serde(rename = "storage", default)]
    pub storage_config: indexer_common::infra::pool::postgres::Config,

    #[serde(rename = "api", default)]
    pub api_config: api::Config,
}
