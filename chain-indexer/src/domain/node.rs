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

use indexer_common::error::BoxError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The maximum number of keys one `ledger_entries` call may carry.
pub const MAX_LEDGER_ENTRY_KEYS: usize = 200;

/// Node abstraction: the chain's RPC surface as the indexer consumes it.
#[trait_variant::make(Send)]
pub trait Node
where
    Self: Clone + Send + Sync + 'static,
{
    /// The sequence number of the latest closed ledger.
    async fn latest_ledger(&self) -> Result<u32, NodeError>;

    /// Fetch contract events starting at the given ledger.
    async fn events(&self, request: EventsRequest) -> Result<EventPage, NodeError>;

    /// Fetch one transaction by hash.
    async fn transaction(&self, hash: &str) -> Result<TransactionInfo, NodeError>;

    /// Fetch ledger entries for up to [MAX_LEDGER_ENTRY_KEYS] base64-encoded keys.
    async fn ledger_entries(&self, keys: &[String]) -> Result<Vec<LedgerEntryItem>, NodeError>;

    /// Fetch the network identification data.
    async fn network(&self) -> Result<NetworkInfo, NodeError>;

    /// Verify the node reports itself healthy.
    async fn health(&self) -> Result<(), NodeError>;
}

/// Error possibly returned by [Node] calls.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("circuit breaker is open")]
    CircuitOpen,

    #[error("request timed out")]
    Timeout,

    #[error("transport error")]
    Transport(#[source] BoxError),

    #[error("unexpected http status {0}")]
    Status(u16),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("malformed rpc response")]
    Malformed(#[source] BoxError),

    #[error("node is not healthy: {0}")]
    Unhealthy(String),
}

/// Parameters for [Node::events].
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventsRequest {
    #[serde(rename = "startLedger")]
    pub start_ledger: u32,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<EventFilter>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl EventsRequest {
    pub fn starting_at(start_ledger: u32, limit: u32) -> Self {
        Self {
            start_ledger,
            filters: Vec::new(),
            pagination: Some(Pagination {
                cursor: None,
                limit,
            }),
        }
    }
}

/// A server-side event filter.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventFilter {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,

    #[serde(rename = "contractIds", skip_serializing_if = "Vec::is_empty")]
    pub contract_ids: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,
}

/// Cursor-based pagination of [Node::events].
#[derive(Debug, Clone, Default, Serialize)]
pub struct Pagination {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,

    pub limit: u32,
}

/// One event as returned by the node, artifacts still in their base64 wire form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventItem {
    pub id: String,

    #[serde(rename = "type", default)]
    pub event_type: String,

    pub ledger: u32,

    #[serde(default)]
    pub ledger_closed_at: String,

    #[serde(rename = "contractId", default)]
    pub contract_id: String,

    #[serde(default)]
    pub paging_token: String,

    #[serde(default)]
    pub topic: Vec<String>,

    #[serde(default)]
    pub value: String,

    #[serde(default)]
    pub in_successful_contract_call: bool,

    #[serde(default)]
    pub tx_hash: String,
}

/// One page of [Node::events] results.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPage {
    #[serde(default)]
    pub events: Vec<EventItem>,

    #[serde(rename = "latestLedger", default)]
    pub latest_ledger: u32,
}

/// One transaction as returned by the node, artifacts still in their base64 wire form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInfo {
    /// Advisory only; the stored key is recomputed from the envelope.
    #[serde(default)]
    pub hash: String,

    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub ledger: u32,

    #[serde(default)]
    pub application_order: i32,

    #[serde(default)]
    pub ledger_close_time: i64,

    #[serde(default)]
    pub envelope_xdr: String,

    #[serde(default)]
    pub result_xdr: String,

    #[serde(default)]
    pub result_meta_xdr: String,
}

/// Network identification data, fetched once at startup.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    pub passphrase: String,

    #[serde(default)]
    pub protocol_version: i32,

    #[serde(rename = "friendbotUrl", default)]
    pub friendbot_url: Option<String>,
}

/// One ledger entry as returned by the node.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntryItem {
    #[serde(default)]
    pub key: String,

    #[serde(default)]
    pub xdr: String,

    #[serde(rename = "lastModifiedLedgerSeq", default)]
    pub last_modified_ledger_seq: u32,

    #[serde(rename = "liveUntilLedgerSeq", default)]
    pub live_until_ledger_seq: u32,
}
