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

use crate::domain::TickBatch;
use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record the outcome of one committed tick.
pub fn observe_tick(batch: &TickBatch, ledger: u32, duration: Duration) {
    gauge!("indexer_last_ledger").set(ledger as f64);

    counter!("indexer_events_total").increment(batch.events.len() as u64);
    counter!("indexer_transactions_total").increment(batch.transactions.len() as u64);
    counter!("indexer_operations_total").increment(batch.operations.len() as u64);
    counter!("indexer_token_operations_total").increment(batch.token_operations.len() as u64);
    counter!("indexer_contract_data_total").increment(batch.contract_data.len() as u64);
    counter!("indexer_contract_code_total").increment(batch.contract_code.len() as u64);

    histogram!("indexer_tick_duration_seconds").record(duration.as_secs_f64());
}
