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

use crate::domain::{Stats, TickBatch};

/// Storage abstraction.
///
/// `save_tick` materializes one tick atomically: every upsert plus the optional cursor advance
/// commit in a single transaction, or none of them do. Upserts are idempotent on each record's
/// primary key; contract code is insert-if-absent.
#[trait_variant::make(Send)]
pub trait Storage
where
    Self: Clone + Send + Sync + 'static,
{
    /// The last successfully committed ledger, zero when the indexer has never run.
    async fn cursor(&self) -> Result<u32, sqlx::Error>;

    /// Checkpoint the cursor outside a tick (used between backfill batches).
    async fn save_cursor(&self, ledger: u32) -> Result<(), sqlx::Error>;

    /// Atomically upsert the whole batch and, when given, advance the cursor.
    async fn save_tick(&self, batch: &TickBatch, cursor: Option<u32>) -> Result<(), sqlx::Error>;

    /// Aggregate counts for the stats endpoint.
    async fn stats(&self) -> Result<Stats, sqlx::Error>;
}
