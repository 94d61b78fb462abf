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

//! The ingest orchestrator: the live poller and the backfiller.
//!
//! Both modes share one per-batch path: parse every event, fan the deduplicated transaction
//! hashes out over the worker pool, parse the fetched artifacts, derive the token projections,
//! and hand the assembled batch to the storage, which commits it in a single transaction. The
//! tick boundary is the recovery barrier: nothing below it aborts the process.

mod metrics;

use crate::domain::{
    TickBatch,
    node::{EventItem, EventsRequest, MAX_LEDGER_ENTRY_KEYS, Node, TransactionInfo},
    parser, token,
    storage::Storage,
};
use anyhow::{Context, bail};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use fastrace::{Span, future::FutureExt as _, prelude::SpanContext, trace};
use indexer_common::{
    domain::{
        NetworkId,
        xdr::ledger::{build_account_key, build_claimable_balance_key},
    },
    error::StdErrorExt,
    worker::WorkerPool,
};
use log::{debug, error, info, warn};
use serde::Deserialize;
use std::{
    collections::BTreeSet,
    time::{Duration, Instant},
};
use tokio::{select, time};
use tokio_util::sync::CancellationToken;

/// How often backfill progress is reported.
const PROGRESS_INTERVAL: Duration = Duration::from_secs(10);

/// Configuration shared by both ingest modes.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Config {
    /// Events per request. Defaults to 1000.
    #[serde(default = "batch_size_default")]
    pub batch_size: u32,

    /// Concurrent transaction fetches. Defaults to 10.
    #[serde(default = "workers_default")]
    pub workers: usize,

    /// Live-mode tick interval. Defaults to 1s.
    #[serde(with = "humantime_serde", default = "poll_interval_default")]
    pub poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            batch_size: batch_size_default(),
            workers: workers_default(),
            poll_interval: poll_interval_default(),
        }
    }
}

/// Parameters of one backfill run.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct BackfillConfig {
    /// First ledger to process; must be positive.
    pub start_ledger: u32,

    /// Last ledger to process; zero means the current latest.
    #[serde(default)]
    pub end_ledger: u32,

    /// Ledgers per batch; zero selects the default of 100.
    #[serde(default)]
    pub batch_size: u32,

    /// Batches per second ceiling; zero selects the default of 10.
    #[serde(default)]
    pub rate_limit: u32,
}

fn batch_size_default() -> u32 {
    1_000
}

fn workers_default() -> usize {
    10
}

fn poll_interval_default() -> Duration {
    Duration::from_secs(1)
}

/// Run the live poller until the token is cancelled.
pub async fn run(
    config: Config,
    node: impl Node,
    storage: impl Storage,
    token: CancellationToken,
) -> anyhow::Result<()> {
    node.health().await.context("rpc health check")?;

    let network = node.network().await.context("get network info")?;
    let network_id = NetworkId::from_passphrase(&network.passphrase);
    info!(passphrase = network.passphrase; "network configured");

    let pool = WorkerPool::new(config.workers);

    let mut interval = time::interval(config.poll_interval);
    interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

    loop {
        select! {
            _ = token.cancelled() => {
                info!("poller stopped");
                return Ok(());
            }

            _ = interval.tick() => {
                let result = tick(config, &node, &storage, &pool, network_id, &token)
                    .in_span(Span::root("tick", SpanContext::random()))
                    .await;

                if let Err(error) = result {
                    error!(error:% = format!("{error:#}"); "tick failed");
                }
            }
        }
    }
}

/// One pass of the live loop: cursor → latest → events → fan-out → parse → derive → commit.
#[trace]
async fn tick(
    config: Config,
    node: &impl Node,
    storage: &impl Storage,
    pool: &WorkerPool,
    network_id: NetworkId,
    token: &CancellationToken,
) -> anyhow::Result<()> {
    let started = Instant::now();

    let cursor = storage.cursor().await.context("get cursor")?;
    let latest = node.latest_ledger().await.context("get latest ledger")?;

    // Nothing new; the cursor never moves backwards.
    if latest <= cursor {
        return Ok(());
    }

    // On the very first run the indexer starts at the head; backfill is a separate mode.
    let start_ledger = if cursor == 0 { latest } else { cursor };

    let page = node
        .events(EventsRequest::starting_at(start_ledger, config.batch_size))
        .await
        .context("get events")?;

    if page.events.is_empty() {
        storage
            .save_tick(&TickBatch::default(), Some(latest))
            .await
            .context("advance cursor")?;
        return Ok(());
    }

    info!(
        events = page.events.len(),
        start_ledger,
        latest;
        "processing batch"
    );

    let (batch, _) = build_batch(&page.events, node, pool, network_id, token, true).await;

    storage
        .save_tick(&batch, Some(latest))
        .await
        .context("save tick")?;

    metrics::observe_tick(&batch, latest, started.elapsed());

    info!(
        events = batch.events.len(),
        transactions = batch.transactions.len(),
        operations = batch.operations.len(),
        contract_data = batch.contract_data.len(),
        contract_code = batch.contract_code.len(),
        token_ops = batch.token_operations.len(),
        ledger = latest,
        duration:? = started.elapsed();
        "batch processed"
    );

    Ok(())
}

/// Hashes and addresses observed while building a batch, feeding the best-effort ledger-entry
/// re-fetch in backfill mode.
#[derive(Debug, Default)]
struct Observed {
    account_addresses: BTreeSet<String>,
    claimable_balance_ids: BTreeSet<String>,
}

/// The shared per-batch path of both modes.
///
/// `recompute_hashes` selects the live-mode hash authority rule; backfill trusts the hash the
/// event reported.
async fn build_batch(
    events: &[EventItem],
    node: &impl Node,
    pool: &WorkerPool,
    network_id: NetworkId,
    token: &CancellationToken,
    recompute_hashes: bool,
) -> (TickBatch, Observed) {
    let mut batch = TickBatch::default();
    let mut observed = Observed::default();

    let mut tx_hashes = Vec::new();
    let mut seen = BTreeSet::new();

    for item in events {
        let event = parser::parse_event(item);

        if let Some(operation) = token::derive_token_operation(&event) {
            batch.token_operations.push(operation);
        }

        batch.events.push(event);

        if !item.tx_hash.is_empty() && seen.insert(item.tx_hash.clone()) {
            tx_hashes.push(item.tx_hash.clone());
        }
    }

    let tasks = tx_hashes
        .into_iter()
        .map(|hash| {
            let node = node.clone();
            move |_token: CancellationToken| async move {
                let result = node.transaction(&hash).await;
                (hash, result)
            }
        })
        .collect();

    for (hash, result) in pool.run_all(token.clone(), tasks).await {
        match result {
            Ok(info) => ingest_transaction(
                &mut batch,
                &mut observed,
                &hash,
                &info,
                network_id,
                recompute_hashes,
            ),
            Err(error) => {
                warn!(tx_hash = hash, error:% = error.as_chain(); "cannot fetch transaction")
            }
        }
    }

    (batch, observed)
}

fn ingest_transaction(
    batch: &mut TickBatch,
    observed: &mut Observed,
    event_hash: &str,
    info: &TransactionInfo,
    network_id: NetworkId,
    recompute_hash: bool,
) {
    let envelope = match parser::decode_envelope(&info.envelope_xdr) {
        Ok(envelope) => envelope,
        Err(error) => {
            warn!(tx_hash = event_hash, error:% = error.as_chain(); "cannot parse transaction");
            return;
        }
    };

    let tx_hash = if recompute_hash {
        resolve_tx_hash(event_hash, info, network_id)
    } else {
        event_hash.to_string()
    };

    let transaction = parser::parse_transaction(info, &envelope, &tx_hash);
    if let Some(source_account) = &transaction.source_account {
        observed.account_addresses.insert(source_account.clone());
    }
    batch.transactions.push(transaction);

    batch
        .operations
        .extend(parser::parse_operations(&tx_hash, &envelope));

    batch.contract_code.extend(parser::extract_contract_code(
        &tx_hash,
        info.ledger,
        info.ledger_close_time,
        &envelope,
    ));

    observed
        .claimable_balance_ids
        .extend(parser::extract_claimable_balance_ids(&envelope));

    if !info.result_meta_xdr.is_empty() {
        match parser::extract_contract_data(&info.result_meta_xdr) {
            Ok(entries) => {
                for entry in entries {
                    if let Some(metadata) =
                        token::derive_token_metadata(&entry.contract_id, &entry.key, &entry.val)
                    {
                        batch.token_metadata.push(metadata);
                    }

                    if let Some(balance) =
                        token::derive_token_balance(&entry.contract_id, &entry.key, &entry.val)
                    {
                        batch.token_balances.push(balance);
                    }

                    batch.contract_data.push(entry);
                }
            }
            Err(error) => {
                warn!(
                    tx_hash,
                    error:% = error.as_chain();
                    "cannot extract contract data from transaction meta"
                );
            }
        }
    }
}

/// The hash-authority rule: an empty node hash defers to the recomputation, a node hash
/// disagreeing with the event hash wins with a warning, and agreement passes through.
fn resolve_tx_hash(event_hash: &str, info: &TransactionInfo, network_id: NetworkId) -> String {
    if info.hash.is_empty() {
        match parser::compute_transaction_hash(&info.envelope_xdr, network_id) {
            Ok(computed) => {
                if computed != event_hash {
                    warn!(
                        event_hash,
                        computed_hash = computed;
                        "computed hash differs from event hash"
                    );
                }
                computed
            }
            Err(error) => {
                debug!(
                    tx_hash = event_hash,
                    error:% = error.as_chain();
                    "cannot compute hash from envelope, using event hash"
                );
                event_hash.to_string()
            }
        }
    } else if info.hash != event_hash {
        warn!(event_hash, rpc_hash = info.hash; "node returned different hash than event");
        info.hash.clone()
    } else {
        info.hash.clone()
    }
}

/// Process historical ledgers in order, checkpointing the cursor after each batch.
pub async fn backfill(
    config: Config,
    backfill_config: BackfillConfig,
    node: impl Node,
    storage: impl Storage,
    token: CancellationToken,
) -> anyhow::Result<()> {
    let started = Instant::now();

    if backfill_config.start_ledger == 0 {
        bail!("start ledger must be > 0");
    }

    let batch_size = if backfill_config.batch_size == 0 {
        100
    } else {
        backfill_config.batch_size
    };
    let rate_limit = if backfill_config.rate_limit == 0 {
        10
    } else {
        backfill_config.rate_limit
    };

    let network = node.network().await.context("get network info")?;
    let network_id = NetworkId::from_passphrase(&network.passphrase);

    let end_ledger = if backfill_config.end_ledger == 0 {
        node.latest_ledger().await.context("get latest ledger")?
    } else {
        backfill_config.end_ledger
    };

    let start_ledger = backfill_config.start_ledger;
    if start_ledger > end_ledger {
        bail!("start ledger ({start_ledger}) must be <= end ledger ({end_ledger})");
    }

    let total_ledgers = end_ledger - start_ledger + 1;
    info!(
        start_ledger,
        end_ledger,
        total_ledgers,
        batch_size,
        rate_limit;
        "starting backfill"
    );

    let pool = WorkerPool::new(config.workers);

    // One batch per rate-limiter tick.
    let mut rate_limiter = time::interval(Duration::from_secs(1) / rate_limit);
    rate_limiter.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

    let mut processed_ledgers = 0u32;
    let mut counts = BatchCounts::default();
    let mut last_progress = Instant::now();
    let mut current = start_ledger;

    while current <= end_ledger {
        select! {
            _ = token.cancelled() => {
                info!(
                    processed_ledgers,
                    current_ledger = current,
                    duration:? = started.elapsed();
                    "backfill cancelled"
                );
                return Ok(());
            }

            _ = rate_limiter.tick() => {}
        }

        let batch_end = (current + batch_size - 1).min(end_ledger);

        let result = process_ledger_range(
            config,
            &node,
            &storage,
            &pool,
            network_id,
            &token,
            current,
            batch_end,
        )
        .in_span(Span::root("backfill-batch", SpanContext::random()))
        .await;

        match result {
            Ok(batch_counts) => counts += batch_counts,
            Err(error) => {
                error!(
                    start_ledger = current,
                    end_ledger = batch_end,
                    error:% = format!("{error:#}");
                    "failed to process ledger batch, continuing with next"
                );
            }
        }

        processed_ledgers += batch_end - current + 1;

        if last_progress.elapsed() >= PROGRESS_INTERVAL {
            let progress = f64::from(processed_ledgers) / f64::from(total_ledgers) * 100.0;
            let remaining = started.elapsed().mul_f64(
                f64::from(total_ledgers - processed_ledgers) / f64::from(processed_ledgers),
            );

            info!(
                progress = format!("{progress:.2}%"),
                processed_ledgers,
                total_ledgers,
                current_ledger = batch_end,
                events = counts.events,
                transactions = counts.transactions,
                operations = counts.operations,
                duration:? = started.elapsed(),
                estimated_remaining:? = remaining;
                "backfill progress"
            );
            last_progress = Instant::now();
        }

        current = batch_end + 1;
    }

    let duration = started.elapsed();
    info!(
        total_ledgers = processed_ledgers,
        events = counts.events,
        transactions = counts.transactions,
        operations = counts.operations,
        duration:?,
        ledgers_per_second = format!("{:.2}", f64::from(processed_ledgers) / duration.as_secs_f64());
        "backfill completed"
    );

    Ok(())
}

#[derive(Debug, Default, Clone, Copy)]
struct BatchCounts {
    events: u64,
    transactions: u64,
    operations: u64,
}

impl std::ops::AddAssign for BatchCounts {
    fn add_assign(&mut self, other: Self) {
        self.events += other.events;
        self.transactions += other.transactions;
        self.operations += other.operations;
    }
}

/// Ingest one ledger range, paginating forward on the last event's ledger until the range is
/// exhausted or a page comes up short, then checkpoint the cursor at the range end.
#[allow(clippy::too_many_arguments)]
async fn process_ledger_range(
    config: Config,
    node: &impl Node,
    storage: &impl Storage,
    pool: &WorkerPool,
    network_id: NetworkId,
    token: &CancellationToken,
    start_ledger: u32,
    end_ledger: u32,
) -> anyhow::Result<BatchCounts> {
    let mut counts = BatchCounts::default();
    let mut page_start = start_ledger;

    loop {
        let page = node
            .events(EventsRequest::starting_at(page_start, config.batch_size))
            .await
            .context("get events")?;

        if page.events.is_empty() {
            break;
        }

        let (mut batch, observed) =
            build_batch(&page.events, node, pool, network_id, token, false).await;

        // Best-effort enrichment from classic ledger entries; never fails the batch.
        fetch_ledger_entries(&mut batch, node, &observed).await;

        storage
            .save_tick(&batch, None)
            .await
            .context("save batch")?;

        counts += BatchCounts {
            events: batch.events.len() as u64,
            transactions: batch.transactions.len() as u64,
            operations: batch.operations.len() as u64,
        };

        let last_ledger = page.events.last().map(|event| event.ledger).unwrap_or(0);
        if last_ledger > end_ledger || (page.events.len() as u32) < config.batch_size {
            break;
        }

        page_start = last_ledger;
    }

    storage
        .save_cursor(end_ledger)
        .await
        .context("update cursor")?;

    Ok(counts)
}

/// Fetch and project ledger entries for the accounts and claimable balances observed in a
/// batch. The node is known to return corrupted bytes for some of these queries, so every
/// failure is logged and swallowed.
async fn fetch_ledger_entries(batch: &mut TickBatch, node: &impl Node, observed: &Observed) {
    let mut keys = Vec::new();

    for address in &observed.account_addresses {
        match build_account_key(address) {
            Ok(key) => keys.push(BASE64.encode(key.to_bytes())),
            Err(error) => {
                warn!(address, error:% = error.as_chain(); "cannot build account ledger key")
            }
        }
    }

    for balance_id in &observed.claimable_balance_ids {
        match build_claimable_balance_key(balance_id) {
            Ok(key) => keys.push(BASE64.encode(key.to_bytes())),
            Err(error) => {
                debug!(
                    balance_id,
                    error:% = error.as_chain();
                    "cannot build claimable balance ledger key"
                )
            }
        }
    }

    for chunk in keys.chunks(MAX_LEDGER_ENTRY_KEYS) {
        let items = match node.ledger_entries(chunk).await {
            Ok(items) => items,
            Err(error) => {
                warn!(
                    keys = chunk.len(),
                    error:% = error.as_chain();
                    "cannot fetch ledger entry batch"
                );
                continue;
            }
        };

        for item in items {
            match parser::parse_ledger_entry(&item) {
                Ok(Some(record)) => batch.push_ledger_entry(record),
                Ok(None) => {}
                Err(error) => {
                    debug!(error:% = error.as_chain(); "cannot parse ledger entry");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        application::{BackfillConfig, Config, backfill, resolve_tx_hash, tick},
        domain::{
            Stats, TickBatch,
            node::{
                EventItem, EventPage, EventsRequest, LedgerEntryItem, NetworkInfo, Node,
                NodeError, TransactionInfo,
            },
            storage::Storage,
        },
    };
    use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
    use indexer_common::{
        domain::{NetworkId, scval::ScVal, strkey, xdr::Writer},
        worker::WorkerPool,
    };
    use serde_json::json;
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    };
    use tokio_util::sync::CancellationToken;

    const PASSPHRASE: &str = "Test SDF Network ; September 2015";

    fn envelope_b64() -> String {
        let mut body = Writer::new();
        body.put_u32(1); // PAYMENT
        body.put_u32(0);
        body.put_fixed(&[2; 32]);
        body.put_u32(0); // native
        body.put_i64(1_000);
        let body = body.into_bytes();

        let mut w = Writer::new();
        w.put_u32(2); // ENVELOPE_TYPE_TX
        w.put_u32(0);
        w.put_fixed(&[1; 32]);
        w.put_u32(100);
        w.put_i64(7);
        w.put_u32(0); // PRECOND_NONE
        w.put_u32(0); // MEMO_NONE
        w.put_u32(1);
        w.put_u32(0); // no per-operation source
        w.put_fixed(&body);
        w.put_u32(0); // ext
        w.put_u32(0); // signatures
        BASE64.encode(w.into_bytes())
    }

    fn transfer_event(id: &str, ledger: u32, tx_hash: &str) -> EventItem {
        EventItem {
            id: id.to_string(),
            event_type: "contract".to_string(),
            ledger,
            ledger_closed_at: "2025-01-01T00:00:00Z".to_string(),
            contract_id: strkey::encode_contract(&[5; 32]),
            paging_token: id.to_string(),
            topic: vec![
                BASE64.encode(ScVal::Symbol("transfer".to_string()).to_bytes()),
                BASE64.encode(ScVal::Symbol("GFROM".to_string()).to_bytes()),
                BASE64.encode(ScVal::Symbol("GTO".to_string()).to_bytes()),
            ],
            value: BASE64.encode(ScVal::I128(1_000_000).to_bytes()),
            in_successful_contract_call: true,
            tx_hash: tx_hash.to_string(),
        }
    }

    #[derive(Debug, Default)]
    struct MockNodeState {
        latest: u32,
        pages: HashMap<u32, EventPage>,
        transactions: HashMap<String, TransactionInfo>,
        cancel_on_events: Option<CancellationToken>,
    }

    #[derive(Debug, Clone, Default)]
    struct MockNode(Arc<Mutex<MockNodeState>>);

    impl Node for MockNode {
        async fn latest_ledger(&self) -> Result<u32, NodeError> {
            Ok(self.0.lock().unwrap().latest)
        }

        async fn events(&self, request: EventsRequest) -> Result<EventPage, NodeError> {
            let mut state = self.0.lock().unwrap();
            if let Some(token) = state.cancel_on_events.take() {
                token.cancel();
            }
            Ok(state
                .pages
                .get(&request.start_ledger)
                .cloned()
                .unwrap_or_default())
        }

        async fn transaction(&self, hash: &str) -> Result<TransactionInfo, NodeError> {
            self.0
                .lock()
                .unwrap()
                .transactions
                .get(hash)
                .cloned()
                .ok_or_else(|| NodeError::Rpc {
                    code: -1,
                    message: "not found".to_string(),
                })
        }

        async fn ledger_entries(
            &self,
            _keys: &[String],
        ) -> Result<Vec<LedgerEntryItem>, NodeError> {
            Ok(Vec::new())
        }

        async fn network(&self) -> Result<NetworkInfo, NodeError> {
            Ok(NetworkInfo {
                passphrase: PASSPHRASE.to_string(),
                protocol_version: 22,
                friendbot_url: None,
            })
        }

        async fn health(&self) -> Result<(), NodeError> {
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct MockStorageState {
        cursor: u32,
        ticks: Vec<(TickBatch, Option<u32>)>,
        checkpoints: Vec<u32>,
    }

    #[derive(Debug, Clone, Default)]
    struct MockStorage(Arc<Mutex<MockStorageState>>);

    impl Storage for MockStorage {
        async fn cursor(&self) -> Result<u32, sqlx::Error> {
            Ok(self.0.lock().unwrap().cursor)
        }

        async fn save_cursor(&self, ledger: u32) -> Result<(), sqlx::Error> {
            let mut state = self.0.lock().unwrap();
            state.cursor = ledger;
            state.checkpoints.push(ledger);
            Ok(())
        }

        async fn save_tick(
            &self,
            batch: &TickBatch,
            cursor: Option<u32>,
        ) -> Result<(), sqlx::Error> {
            let mut state = self.0.lock().unwrap();
            if let Some(cursor) = cursor {
                state.cursor = cursor;
            }
            state.ticks.push((batch.clone(), cursor));
            Ok(())
        }

        async fn stats(&self) -> Result<Stats, sqlx::Error> {
            Ok(Stats::default())
        }
    }

    async fn run_tick(node: &MockNode, storage: &MockStorage) {
        tick(
            Config::default(),
            node,
            storage,
            &WorkerPool::new(2),
            NetworkId::from_passphrase(PASSPHRASE),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_empty_poll_leaves_cursor() {
        let node = MockNode::default();
        node.0.lock().unwrap().latest = 100;
        let storage = MockStorage::default();
        storage.0.lock().unwrap().cursor = 100;

        run_tick(&node, &storage).await;

        let state = storage.0.lock().unwrap();
        assert_eq!(state.cursor, 100);
        assert!(state.ticks.is_empty());
    }

    #[tokio::test]
    async fn test_no_events_advances_cursor() {
        let node = MockNode::default();
        node.0.lock().unwrap().latest = 105;
        let storage = MockStorage::default();
        storage.0.lock().unwrap().cursor = 100;

        run_tick(&node, &storage).await;

        let state = storage.0.lock().unwrap();
        assert_eq!(state.cursor, 105);
        assert_eq!(state.ticks.len(), 1);
        assert!(state.ticks[0].0.is_empty());
    }

    #[tokio::test]
    async fn test_single_event_produces_event_and_token_operation() {
        let envelope = envelope_b64();
        let computed_hash = crate::domain::parser::compute_transaction_hash(
            &envelope,
            NetworkId::from_passphrase(PASSPHRASE),
        )
        .unwrap();

        let node = MockNode::default();
        {
            let mut state = node.0.lock().unwrap();
            state.latest = 101;
            state.pages.insert(
                100,
                EventPage {
                    events: vec![transfer_event("0000000101-0000000001", 101, &computed_hash)],
                    latest_ledger: 101,
                },
            );
            state.transactions.insert(
                computed_hash.clone(),
                TransactionInfo {
                    hash: String::new(), // forces recomputation
                    status: "SUCCESS".to_string(),
                    ledger: 101,
                    application_order: 1,
                    ledger_close_time: 1_700_000_000,
                    envelope_xdr: envelope,
                    result_xdr: String::new(),
                    result_meta_xdr: String::new(),
                },
            );
        }

        let storage = MockStorage::default();
        storage.0.lock().unwrap().cursor = 100;

        run_tick(&node, &storage).await;

        let state = storage.0.lock().unwrap();
        assert_eq!(state.cursor, 101);
        let (batch, cursor) = &state.ticks[0];
        assert_eq!(*cursor, Some(101));
        assert_eq!(batch.events.len(), 1);
        assert_eq!(batch.events[0].value, json!("1000000"));

        assert_eq!(batch.token_operations.len(), 1);
        let op = &batch.token_operations[0];
        assert_eq!(op.id, "0000000101-0000000001");
        assert_eq!(op.op_type, "transfer");
        assert_eq!(op.from, "GFROM");
        assert_eq!(op.to.as_deref(), Some("GTO"));
        assert_eq!(op.amount.as_deref(), Some("1000000"));

        // The stored transaction is keyed by the recomputed hash.
        assert_eq!(batch.transactions.len(), 1);
        assert_eq!(batch.transactions[0].id, computed_hash);
        assert_eq!(batch.operations.len(), 1);
    }

    #[tokio::test]
    async fn test_contract_instance_yields_metadata_and_contract_data() {
        use indexer_common::domain::scval::{
            ContractExecutable, ScAddress, ScContractInstance, ScMapEntry,
        };

        let instance = ScVal::ContractInstance(ScContractInstance {
            executable: ContractExecutable::Wasm([0xaa; 32]),
            storage: vec![
                ScMapEntry {
                    key: ScVal::Symbol("METADATA".to_string()),
                    val: ScVal::Map(vec![
                        ScMapEntry {
                            key: ScVal::Symbol("name".to_string()),
                            val: ScVal::String("T".to_string()),
                        },
                        ScMapEntry {
                            key: ScVal::Symbol("symbol".to_string()),
                            val: ScVal::String("TKN".to_string()),
                        },
                        ScMapEntry {
                            key: ScVal::Symbol("decimal".to_string()),
                            val: ScVal::U32(7),
                        },
                    ]),
                },
                ScMapEntry {
                    key: ScVal::Symbol("Admin".to_string()),
                    val: ScVal::Symbol("GADMIN".to_string()),
                },
            ],
        });

        let meta = {
            let mut w = Writer::new();
            w.put_u32(3); // meta v3
            w.put_u32(0); // ext
            w.put_u32(0); // txChangesBefore
            w.put_u32(0); // operations
            w.put_u32(1); // txChangesAfter
            w.put_u32(0); // CREATED
            w.put_u32(200); // lastModifiedLedgerSeq
            w.put_u32(6); // CONTRACT_DATA
            w.put_u32(0); // ext
            ScAddress::Contract([5; 32]).encode(&mut w);
            ScVal::LedgerKeyContractInstance.encode(&mut w);
            w.put_u32(1); // persistent
            instance.encode(&mut w);
            w.put_u32(0); // entry ext
            w.put_u32(0); // sorobanMeta absent
            BASE64.encode(w.into_bytes())
        };

        let envelope = envelope_b64();
        let computed_hash = crate::domain::parser::compute_transaction_hash(
            &envelope,
            NetworkId::from_passphrase(PASSPHRASE),
        )
        .unwrap();

        let node = MockNode::default();
        {
            let mut state = node.0.lock().unwrap();
            state.latest = 200;
            state.pages.insert(
                199,
                EventPage {
                    events: vec![transfer_event("0000000200-0000000001", 200, &computed_hash)],
                    latest_ledger: 200,
                },
            );
            state.transactions.insert(
                computed_hash.clone(),
                TransactionInfo {
                    hash: computed_hash.clone(),
                    status: "SUCCESS".to_string(),
                    ledger: 200,
                    application_order: 1,
                    ledger_close_time: 1_700_000_000,
                    envelope_xdr: envelope,
                    result_xdr: String::new(),
                    result_meta_xdr: meta,
                },
            );
        }

        let storage = MockStorage::default();
        storage.0.lock().unwrap().cursor = 199;

        run_tick(&node, &storage).await;

        let state = storage.0.lock().unwrap();
        let (batch, _) = &state.ticks[0];

        assert_eq!(batch.contract_data.len(), 1);
        let contract_id = strkey::encode_contract(&[5; 32]);
        assert_eq!(batch.contract_data[0].contract_id, contract_id);
        assert_eq!(
            batch.contract_data[0].key,
            json!({"type": "LedgerKeyContractInstance"})
        );

        assert_eq!(batch.token_metadata.len(), 1);
        let metadata = &batch.token_metadata[0];
        assert_eq!(metadata.contract_id, contract_id);
        assert_eq!(metadata.name, "T");
        assert_eq!(metadata.symbol, "TKN");
        assert_eq!(metadata.decimal, 7);
        assert_eq!(metadata.admin_address, "GADMIN");
    }

    #[tokio::test]
    async fn test_resolve_tx_hash_rules() {
        let envelope = envelope_b64();
        let network_id = NetworkId::from_passphrase(PASSPHRASE);
        let computed =
            crate::domain::parser::compute_transaction_hash(&envelope, network_id).unwrap();

        // Empty node hash: the recomputation wins.
        let info = TransactionInfo {
            hash: String::new(),
            envelope_xdr: envelope.clone(),
            ..Default::default()
        };
        assert_eq!(resolve_tx_hash("abc", &info, network_id), computed);

        // Node hash disagreeing with the event hash: the node hash wins.
        let info = TransactionInfo {
            hash: "def".to_string(),
            envelope_xdr: envelope.clone(),
            ..Default::default()
        };
        assert_eq!(resolve_tx_hash("abc", &info, network_id), "def");

        // Agreement passes through.
        let info = TransactionInfo {
            hash: "abc".to_string(),
            envelope_xdr: envelope,
            ..Default::default()
        };
        assert_eq!(resolve_tx_hash("abc", &info, network_id), "abc");
    }

    #[tokio::test(start_paused = true)]
    async fn test_backfill_batches_and_checkpoints() {
        let node = MockNode::default();
        node.0.lock().unwrap().latest = 2_000;
        let storage = MockStorage::default();

        backfill(
            Config::default(),
            BackfillConfig {
                start_ledger: 1_000,
                end_ledger: 1_002,
                batch_size: 2,
                rate_limit: 10,
            },
            node,
            storage.clone(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        let state = storage.0.lock().unwrap();
        assert_eq!(state.checkpoints, vec![1_001, 1_002]);
        assert_eq!(state.cursor, 1_002);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backfill_cancellation_between_batches() {
        let token = CancellationToken::new();
        let node = MockNode::default();
        // Cancel during the first range; cancellation is honored between batches only.
        node.0.lock().unwrap().cancel_on_events = Some(token.clone());
        let storage = MockStorage::default();

        backfill(
            Config::default(),
            BackfillConfig {
                start_ledger: 1_000,
                end_ledger: 1_002,
                batch_size: 2,
                rate_limit: 10,
            },
            node,
            storage.clone(),
            token,
        )
        .await
        .unwrap();

        let state = storage.0.lock().unwrap();
        assert_eq!(state.checkpoints, vec![1_001]);
        assert_eq!(state.cursor, 1_001);
    }

    #[tokio::test]
    async fn test_backfill_rejects_zero_start() {
        let result = backfill(
            Config::default(),
            BackfillConfig::default(),
            MockNode::default(),
            MockStorage::default(),
            CancellationToken::new(),
        )
        .await;

        assert!(result.is_err());
    }
}
