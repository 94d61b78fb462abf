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

//! The health/stats HTTP surface.

use crate::domain::{Stats, storage::Storage};
use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use indexer_common::error::StdErrorExt;
use log::{error, info};
use serde::Deserialize;
use std::{
    io,
    net::{IpAddr, Ipv4Addr},
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Serve `/health` and `/stats` until the token is cancelled.
pub async fn serve<S: Storage>(
    config: Config,
    storage: S,
    token: CancellationToken,
) -> Result<(), Error> {
    let Config { address, port } = config;

    let app = Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats::<S>))
        .with_state(storage);

    let listener = TcpListener::bind((address, port))
        .await
        .map_err(Error::Bind)?;
    info!(address:?, port; "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await
        .map_err(Error::Serve)
}

async fn health() -> &'static str {
    "OK"
}

async fn stats<S>(State(storage): State<S>) -> Result<Json<Stats>, StatusCode>
where
    S: Storage,
{
    storage.stats().await.map(Json).map_err(|error| {
        error!(error:% = error.as_chain(); "cannot load stats");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Error possibly returned by [serve].
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot bind tcp listener")]
    Bind(#[source] io::Error),

    #[error("cannot serve http endpoints")]
    Serve(#[source] io::Error),
}

/// Configuration for the HTTP surface.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Config {
    /// Defaults to `"0.0.0.0"`.
    #[serde(default = "address_default")]
    pub address: IpAddr,

    /// Defaults to `8,080`.
    #[serde(default = "port_default")]
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: address_default(),
            port: port_default(),
        }
    }
}

fn address_default() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn port_default() -> u16 {
    8_080
}
