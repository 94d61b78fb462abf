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

use anyhow::{Context, bail};
use chain_indexer::{
    application::{self, BackfillConfig},
    config::Config,
    infra::{self, api, node::JsonRpcNode, storage::postgres::PostgresStorage},
};
use clap::Parser;
use indexer_common::{
    config::ConfigExt,
    error::StdErrorExt,
    infra::{migrations, pool::postgres::PostgresPool},
    telemetry,
};
use log::{error, info};
use secrecy::ExposeSecret;
use std::{env, panic, path::Path, process, time::Duration};
use tokio::{select, signal, time};
use tokio_util::sync::CancellationToken;

/// Grace window between the shutdown signal and process exit.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Parser)]
#[command(about = "Indexer for a Soroban RPC node")]
struct Cli {
    /// First ledger for backfill mode; 0 selects live polling.
    #[arg(long, default_value_t = 0)]
    start_ledger: u32,

    /// Last ledger for backfill mode; 0 selects the current ledger.
    #[arg(long, default_value_t = 0)]
    end_ledger: u32,

    /// Ledgers per backfill batch.
    #[arg(long, default_value_t = 100)]
    batch_size: u32,

    /// Max backfill batches per second.
    #[arg(long, default_value_t = 10)]
    rate_limit: u32,
}

#[tokio::main]
async fn main() {
    // Initialize logging.
    telemetry::init_logging();

    // Replace the default panic hook with one that uses structured logging at ERROR level.
    panic::set_hook(Box::new(|panic| error!(panic:%; "process panicked")));

    // Run and log any error.
    if let Err(error) = run().await {
        let error = format!("{error:#}");
        error!(error; "process exited with ERROR");
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config().context("load configuration")?;
    apply_env_overrides(&mut config);

    telemetry::init_tracing(config.telemetry_config.tracing_config.clone());
    telemetry::init_metrics(config.telemetry_config.metrics_config.clone());

    let Config {
        run_migrations,
        application_config,
        infra_config,
        ..
    } = config;

    let infra::Config {
        node_config,
        storage_config,
        api_config,
    } = infra_config;

    if storage_config.dsn.expose_secret().is_empty() {
        bail!("POSTGRES_DSN environment variable is required");
    }

    info!(
        run_migrations,
        application_config:?,
        node_url = node_config.url;
        "starting"
    );

    let pool = PostgresPool::new(storage_config)
        .await
        .context("create DB pool for Postgres")?;
    if run_migrations {
        migrations::postgres::run(&pool)
            .await
            .context("run Postgres migrations")?;
    }
    let storage = PostgresStorage::new(pool);

    let node = JsonRpcNode::new(node_config).context("create JsonRpcNode")?;

    let token = CancellationToken::new();

    tokio::spawn({
        let token = token.clone();
        async move {
            shutdown_signal().await;
            info!("received shutdown signal");
            token.cancel();
        }
    });

    tokio::spawn({
        let storage = storage.clone();
        let token = token.clone();
        async move {
            if let Err(error) = api::serve(api_config, storage, token).await {
                error!(error:% = error.as_chain(); "http server failed");
            }
        }
    });

    if cli.start_ledger > 0 {
        info!(
            start_ledger = cli.start_ledger,
            end_ledger = cli.end_ledger,
            batch_size = cli.batch_size,
            rate_limit = cli.rate_limit;
            "starting in backfill mode"
        );

        application::backfill(
            application_config,
            BackfillConfig {
                start_ledger: cli.start_ledger,
                end_ledger: cli.end_ledger,
                batch_size: cli.batch_size,
                rate_limit: cli.rate_limit,
            },
            node,
            storage,
            token.clone(),
        )
        .await
        .context("run backfill")?;
    } else {
        info!("starting in live polling mode");

        application::run(application_config, node, storage, token.clone())
            .await
            .context("run poller")?;
    }

    token.cancel();
    time::sleep(SHUTDOWN_GRACE).await;
    info!("indexer stopped");

    Ok(())
}

fn load_config() -> anyhow::Result<Config> {
    let config_file = env::var("CONFIG_FILE").unwrap_or_else(|_| "config.yaml".to_string());

    if Path::new(&config_file).exists() {
        Config::load().map_err(|error| anyhow::anyhow!(error))
    } else {
        Ok(Config::default())
    }
}

// The minimal environment surface wins over the configuration file.
fn apply_env_overrides(config: &mut Config) {
    if let Ok(dsn) = env::var("POSTGRES_DSN") {
        config.infra_config.storage_config.dsn = dsn.into();
    }

    if let Ok(url) = env::var("STELLAR_RPC_URL") {
        config.infra_config.node_config.url = url;
    }
}

async fn shutdown_signal() {
    let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
        .expect("SIGTERM handler can be installed");

    select! {
        _ = signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}
