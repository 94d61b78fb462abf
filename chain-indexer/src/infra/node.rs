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

//! JSON-RPC 2.0 implementation of [Node].
//!
//! Every call passes through one shared circuit breaker, whose per-request deadline composes
//! with the transport timeout; the failure count is global across all callers of this node.

use crate::domain::node::{
    EventPage, EventsRequest, LedgerEntryItem, NetworkInfo, Node, NodeError, TransactionInfo,
};
use indexer_common::breaker::{self, BreakerError, CircuitBreaker};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::{sync::Arc, time::Duration};
use thiserror::Error;

/// JSON-RPC based implementation of [Node].
#[derive(Debug, Clone)]
pub struct JsonRpcNode {
    client: reqwest::Client,
    endpoint: String,
    breaker: Arc<CircuitBreaker>,
}

impl JsonRpcNode {
    /// Try to create a new [JsonRpcNode] with the given config.
    pub fn new(config: Config) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: config.url,
            breaker: Arc::new(CircuitBreaker::new(config.breaker_config)),
        })
    }

    async fn call<P, R>(&self, method: &'static str, params: Option<P>) -> Result<R, NodeError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };

        let result = self
            .breaker
            .call(async {
                let response = self
                    .client
                    .post(&self.endpoint)
                    .json(&request)
                    .send()
                    .await
                    .map_err(|error| NodeError::Transport(error.into()))?;

                let status = response.status();
                if !status.is_success() {
                    return Err(NodeError::Status(status.as_u16()));
                }

                let response = response
                    .json::<JsonRpcResponse<R>>()
                    .await
                    .map_err(|error| NodeError::Malformed(error.into()))?;

                if let Some(error) = response.error {
                    return Err(NodeError::Rpc {
                        code: error.code,
                        message: error.message,
                    });
                }

                response
                    .result
                    .ok_or_else(|| NodeError::Malformed("response carries no result".into()))
            })
            .await;

        match result {
            Ok(result) => Ok(result),
            Err(BreakerError::Open) => Err(NodeError::CircuitOpen),
            Err(BreakerError::Timeout(_)) => Err(NodeError::Timeout),
            Err(BreakerError::Call(error)) => Err(error),
        }
    }
}

impl Node for JsonRpcNode {
    async fn latest_ledger(&self) -> Result<u32, NodeError> {
        let response = self
            .call::<(), LatestLedgerResponse>("getLatestLedger", None)
            .await?;
        Ok(response.sequence)
    }

    async fn events(&self, request: EventsRequest) -> Result<EventPage, NodeError> {
        self.call("getEvents", Some(request)).await
    }

    async fn transaction(&self, hash: &str) -> Result<TransactionInfo, NodeError> {
        self.call(
            "getTransaction",
            Some(TransactionRequest {
                hash: hash.to_string(),
            }),
        )
        .await
    }

    async fn ledger_entries(&self, keys: &[String]) -> Result<Vec<LedgerEntryItem>, NodeError> {
        let response = self
            .call::<_, LedgerEntriesResponse>(
                "getLedgerEntries",
                Some(LedgerEntriesRequest {
                    keys: keys.to_vec(),
                }),
            )
            .await?;
        Ok(response.entries)
    }

    async fn network(&self) -> Result<NetworkInfo, NodeError> {
        self.call::<(), NetworkInfo>("getNetwork", None).await
    }

    async fn health(&self) -> Result<(), NodeError> {
        let response = self.call::<(), HealthResponse>("getHealth", None).await?;

        if response.status != "healthy" {
            return Err(NodeError::Unhealthy(response.status));
        }

        Ok(())
    }
}

/// Error possibly returned by [JsonRpcNode::new].
#[derive(Debug, Error)]
#[error("cannot create http client")]
pub struct Error(#[from] reqwest::Error);

/// Configuration for [JsonRpcNode].
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Defaults to `"http://stellar-rpc:8000"`.
    #[serde(default = "url_default")]
    pub url: String,

    /// Transport-level deadline. Defaults to 30s.
    #[serde(with = "humantime_serde", default = "timeout_default")]
    pub timeout: Duration,

    #[serde(rename = "breaker", default)]
    pub breaker_config: breaker::Config,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: url_default(),
            timeout: timeout_default(),
            breaker_config: breaker::Config::default(),
        }
    }
}

fn url_default() -> String {
    "http://stellar-rpc:8000".to_string()
}

fn timeout_default() -> Duration {
    Duration::from_secs(30)
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<P> {
    jsonrpc: &'static str,
    id: u32,
    method: &'static str,

    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<P>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<R> {
    result: Option<R>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct LatestLedgerResponse {
    sequence: u32,
}

#[derive(Debug, Serialize)]
struct TransactionRequest {
    hash: String,
}

#[derive(Debug, Serialize)]
struct LedgerEntriesRequest {
    keys: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct LedgerEntriesResponse {
    #[serde(default)]
    entries: Vec<LedgerEntryItem>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

#[cfg(test)]
mod tests {
    use crate::{
        domain::node::EventsRequest,
        infra::node::{Config, JsonRpcNode, JsonRpcRequest, JsonRpcResponse},
    };
    use serde_json::json;

    #[test]
    fn test_request_shape() {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method: "getEvents",
            params: Some(EventsRequest::starting_at(100, 1_000)),
        };

        let request = serde_json::to_value(&request).unwrap();
        assert_eq!(
            request,
            json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "getEvents",
                "params": {
                    "startLedger": 100,
                    "pagination": {"limit": 1_000},
                },
            })
        );
    }

    #[test]
    fn test_request_without_params() {
        let request = JsonRpcRequest::<()> {
            jsonrpc: "2.0",
            id: 1,
            method: "getLatestLedger",
            params: None,
        };

        let request = serde_json::to_value(&request).unwrap();
        assert_eq!(
            request,
            json!({"jsonrpc": "2.0", "id": 1, "method": "getLatestLedger"})
        );
    }

    #[test]
    fn test_response_error_shape() {
        let response = serde_json::from_value::<JsonRpcResponse<u32>>(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32_600, "message": "invalid request"},
        }))
        .unwrap();

        let error = response.error.unwrap();
        assert_eq!(error.code, -32_600);
        assert_eq!(error.message, "invalid request");
        assert!(response.result.is_none());
    }

    #[test]
    fn test_config_defaults() {
        let config = serde_json::from_str::<Config>("{}").unwrap();
        assert_eq!(config.url, "http://stellar-rpc:8000");
        assert_eq!(config.timeout.as_secs(), 30);

        let node = JsonRpcNode::new(config);
        assert!(node.is_ok());
    }
}
