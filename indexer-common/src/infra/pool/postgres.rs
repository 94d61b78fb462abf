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

use log::debug;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::{ops::Deref, str::FromStr, time::Duration};
use thiserror::Error;

/// New type for `sqlx::PgPool`, allowing for some custom extensions as well as security.
///
/// To use as `&sqlx::PgPool` in `Query::execute`, use its `Deref` implementation: `&*pool` or
/// `pool.deref()`.
#[derive(Debug, Clone)]
pub struct PostgresPool(sqlx::PgPool);

impl PostgresPool {
    /// Try to create a new [PostgresPool] with the given config.
    pub async fn new(config: Config) -> Result<Self, Error> {
        let Config {
            dsn,
            max_connections,
            min_connections,
            idle_timeout,
            max_lifetime,
        } = config;

        let connect_options =
            PgConnectOptions::from_str(dsn.expose_secret()).map_err(Error::InvalidDsn)?;

        let inner = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .idle_timeout(Some(idle_timeout))
            .max_lifetime(max_lifetime)
            .connect_with(connect_options)
            .await
            .map_err(Error::Connect)?;
        let pool = PostgresPool(inner);
        debug!(pool:?; "created pool");

        Ok(pool)
    }
}

impl Deref for PostgresPool {
    type Target = sqlx::PgPool;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Error possibly returned by [PostgresPool::new].
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot parse Postgres DSN")]
    InvalidDsn(#[source] sqlx::Error),

    #[error("cannot create Postgres connection pool")]
    Connect(#[source] sqlx::Error),
}

/// Configuration for [PostgresPool].
///
/// The DSN is the standard connection string; it is required, all other fields default to the
/// bounds the ingest loop is designed around.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "dsn_default")]
    pub dsn: SecretString,

    #[serde(default = "max_connections_default")]
    pub max_connections: u32,

    #[serde(default = "min_connections_default")]
    pub min_connections: u32,

    #[serde(with = "humantime_serde", default = "idle_timeout_default")]
    pub idle_timeout: Duration,

    #[serde(with = "humantime_serde", default = "max_lifetime_default")]
    pub max_lifetime: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dsn: dsn_default(),
            max_connections: max_connections_default(),
            min_connections: min_connections_default(),
            idle_timeout: idle_timeout_default(),
            max_lifetime: max_lifetime_default(),
        }
    }
}

fn dsn_default() -> SecretString {
    String::new().into()
}

fn max_connections_default() -> u32 {
    100
}

fn min_connections_default() -> u32 {
    10
}

fn idle_timeout_default() -> Duration {
    Duration::from_secs(10 * 60)
}

fn max_lifetime_default() -> Duration {
    Duration::from_secs(60 * 60)
}

#[cfg(test)]
mod tests {
    use crate::infra::pool::postgres::Config;

    #[test]
    fn test_config_defaults() {
        let config =
            serde_json::from_str::<Config>(r#"{"dsn": "postgres://indexer@localhost/indexer"}"#)
                .unwrap();

        assert_eq!(config.max_connections, 100);
        assert_eq!(config.min_connections, 10);
        assert_eq!(config.max_lifetime.as_secs(), 3_600);
    }
}
