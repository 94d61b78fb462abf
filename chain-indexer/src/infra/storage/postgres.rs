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

//! Postgres based implementation of [Storage].
//!
//! One tick commits in one transaction: every upsert helper takes the caller's transaction
//! handle and never opens its own. Upserts overwrite all mutable columns on conflict, except
//! contract code, which is immutable once inserted. Records are written in 100-row chunks and
//! deduplicated by primary key first (last observation wins), since a multi-row upsert must not
//! touch the same row twice.

use crate::domain::{
    AccountDataEntryRecord, AccountEntryRecord, ClaimableBalanceEntryRecord, ContractCodeRecord,
    ContractDataEntryRecord, Event, LiquidityPoolEntryRecord, OfferEntryRecord, OperationRecord,
    Stats, TickBatch, TokenBalanceRecord, TokenMetadataRecord, TokenOperationRecord, Transaction,
    TrustLineEntryRecord, storage::Storage,
};
use fastrace::trace;
use indexer_common::infra::pool::postgres::PostgresPool;
use indoc::indoc;
use sqlx::{Postgres, QueryBuilder, types::Json};
use std::collections::HashMap;

type Tx = sqlx::Transaction<'static, Postgres>;

/// Records per multi-row statement.
const CHUNK_SIZE: usize = 100;

/// Postgres based implementation of [Storage].
#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: PostgresPool,
}

impl PostgresStorage {
    /// Create a new [PostgresStorage].
    pub fn new(pool: PostgresPool) -> Self {
        Self { pool }
    }
}

impl Storage for PostgresStorage {
    #[trace]
    async fn cursor(&self) -> Result<u32, sqlx::Error> {
        let query = indoc! {"
            SELECT last_ledger
            FROM indexer_cursor
            WHERE id = 1
        "};

        let row = sqlx::query_as::<_, (i64,)>(query)
            .fetch_optional(&*self.pool)
            .await?;

        Ok(row.map(|(last_ledger,)| last_ledger as u32).unwrap_or(0))
    }

    #[trace]
    async fn save_cursor(&self, ledger: u32) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        write_cursor(ledger, &mut tx).await?;
        tx.commit().await
    }

    #[trace]
    async fn save_tick(&self, batch: &TickBatch, cursor: Option<u32>) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        upsert_events(&batch.events, &mut tx).await?;
        upsert_transactions(&batch.transactions, &mut tx).await?;
        upsert_operations(&batch.operations, &mut tx).await?;
        upsert_contract_data(&batch.contract_data, &mut tx).await?;
        insert_contract_code(&batch.contract_code, &mut tx).await?;
        upsert_token_operations(&batch.token_operations, &mut tx).await?;
        upsert_token_metadata(&batch.token_metadata, &mut tx).await?;
        upsert_token_balances(&batch.token_balances, &mut tx).await?;
        upsert_account_entries(&batch.account_entries, &mut tx).await?;
        upsert_trust_line_entries(&batch.trust_line_entries, &mut tx).await?;
        upsert_offer_entries(&batch.offer_entries, &mut tx).await?;
        upsert_account_data_entries(&batch.account_data_entries, &mut tx).await?;
        upsert_claimable_balance_entries(&batch.claimable_balance_entries, &mut tx).await?;
        upsert_liquidity_pool_entries(&batch.liquidity_pool_entries, &mut tx).await?;

        if let Some(ledger) = cursor {
            write_cursor(ledger, &mut tx).await?;
        }

        tx.commit().await
    }

    #[trace]
    async fn stats(&self) -> Result<Stats, sqlx::Error> {
        let last_ledger = self.cursor().await?;

        let count = |query: &'static str| {
            let pool = self.pool.clone();
            async move {
                let (count,) = sqlx::query_as::<_, (i64,)>(query).fetch_one(&*pool).await?;
                Ok::<_, sqlx::Error>(count)
            }
        };

        Ok(Stats {
            last_ledger,
            total_events: count("SELECT count(*) FROM events").await?,
            total_transactions: count("SELECT count(*) FROM transactions").await?,
            total_token_ops: count("SELECT count(*) FROM token_operations").await?,
            total_contract_data: count("SELECT count(*) FROM contract_data_entries").await?,
        })
    }
}

async fn write_cursor(ledger: u32, tx: &mut Tx) -> Result<(), sqlx::Error> {
    let query = indoc! {"
        INSERT INTO indexer_cursor (id, last_ledger, updated_at)
        VALUES (1, $1, now())
        ON CONFLICT (id) DO UPDATE SET
            last_ledger = EXCLUDED.last_ledger,
            updated_at = now()
    "};

    sqlx::query(query)
        .bind(ledger as i64)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

// A multi-row upsert fails when one statement touches the same row twice, so each helper first
// collapses its input to one record per primary key, last observation winning.
fn dedup_last_by<'a, T>(items: &'a [T], key: impl Fn(&T) -> String) -> Vec<&'a T> {
    let mut by_key = HashMap::new();
    let mut order = Vec::with_capacity(items.len());

    for item in items {
        let key = key(item);
        if by_key.insert(key.clone(), item).is_none() {
            order.push(key);
        }
    }

    order.into_iter().map(|key| by_key[&key]).collect()
}

#[trace]
async fn upsert_events(events: &[Event], tx: &mut Tx) -> Result<(), sqlx::Error> {
    let events = dedup_last_by(events, |event| event.id.clone());

    for chunk in events.chunks(CHUNK_SIZE) {
        let query = indoc! {"
            INSERT INTO events (
                id,
                tx_index,
                type,
                ledger,
                ledger_closed_at,
                contract_id,
                paging_token,
                topic,
                value,
                in_successful_contract_call,
                last_modified_ledger_seq
            )
        "};

        QueryBuilder::new(query)
            .push_values(chunk, |mut q, event| {
                q.push_bind(&event.id)
                    .push_bind(event.tx_index)
                    .push_bind(&event.event_type)
                    .push_bind(event.ledger as i64)
                    .push_bind(&event.ledger_closed_at)
                    .push_bind(&event.contract_id)
                    .push_bind(&event.paging_token)
                    .push_bind(Json(&event.topic))
                    .push_bind(Json(&event.value))
                    .push_bind(event.in_successful_contract_call)
                    .push_bind(event.last_modified_ledger_seq as i64);
            })
            .push(indoc! {"
                ON CONFLICT (id) DO UPDATE SET
                    tx_index = EXCLUDED.tx_index,
                    type = EXCLUDED.type,
                    ledger = EXCLUDED.ledger,
                    ledger_closed_at = EXCLUDED.ledger_closed_at,
                    contract_id = EXCLUDED.contract_id,
                    paging_token = EXCLUDED.paging_token,
                    topic = EXCLUDED.topic,
                    value = EXCLUDED.value,
                    in_successful_contract_call = EXCLUDED.in_successful_contract_call,
                    last_modified_ledger_seq = EXCLUDED.last_modified_ledger_seq,
                    updated_at = now()
            "})
            .build()
            .execute(&mut **tx)
            .await?;
    }

    Ok(())
}

#[trace]
async fn upsert_transactions(transactions: &[Transaction], tx: &mut Tx) -> Result<(), sqlx::Error> {
    let transactions = dedup_last_by(transactions, |transaction| transaction.id.clone());

    for chunk in transactions.chunks(CHUNK_SIZE) {
        let query = indoc! {"
            INSERT INTO transactions (
                id,
                status,
                ledger,
                ledger_created_at,
                application_order,
                fee_bump,
                fee_bump_info,
                fee,
                fee_charged,
                sequence,
                source_account,
                muxed_account_id,
                memo,
                preconditions,
                signatures
            )
        "};

        QueryBuilder::new(query)
            .push_values(chunk, |mut q, transaction| {
                q.push_bind(&transaction.id)
                    .push_bind(&transaction.status)
                    .push_bind(transaction.ledger.map(|ledger| ledger as i64))
                    .push_bind(transaction.ledger_created_at)
                    .push_bind(transaction.application_order)
                    .push_bind(transaction.fee_bump)
                    .push_bind(transaction.fee_bump_info.as_ref().map(Json))
                    .push_bind(transaction.fee)
                    .push_bind(transaction.fee_charged)
                    .push_bind(transaction.sequence)
                    .push_bind(&transaction.source_account)
                    .push_bind(transaction.muxed_account_id)
                    .push_bind(transaction.memo.as_ref().map(Json))
                    .push_bind(transaction.preconditions.as_ref().map(Json))
                    .push_bind(transaction.signatures.as_ref().map(Json));
            })
            .push(indoc! {"
                ON CONFLICT (id) DO UPDATE SET
                    status = EXCLUDED.status,
                    ledger = EXCLUDED.ledger,
                    ledger_created_at = EXCLUDED.ledger_created_at,
                    application_order = EXCLUDED.application_order,
                    fee_bump = EXCLUDED.fee_bump,
                    fee_bump_info = EXCLUDED.fee_bump_info,
                    fee = EXCLUDED.fee,
                    fee_charged = EXCLUDED.fee_charged,
                    sequence = EXCLUDED.sequence,
                    source_account = EXCLUDED.source_account,
                    muxed_account_id = EXCLUDED.muxed_account_id,
                    memo = EXCLUDED.memo,
                    preconditions = EXCLUDED.preconditions,
                    signatures = EXCLUDED.signatures,
                    updated_at = now()
            "})
            .build()
            .execute(&mut **tx)
            .await?;
    }

    Ok(())
}

#[trace]
async fn upsert_operations(operations: &[OperationRecord], tx: &mut Tx) -> Result<(), sqlx::Error> {
    let operations = dedup_last_by(operations, |operation| operation.id.clone());

    for chunk in operations.chunks(CHUNK_SIZE) {
        let query = indoc! {"
            INSERT INTO operations (
                id,
                tx_hash,
                operation_index,
                source_account,
                operation_type,
                operation_details
            )
        "};

        QueryBuilder::new(query)
            .push_values(chunk, |mut q, operation| {
                q.push_bind(&operation.id)
                    .push_bind(&operation.tx_hash)
                    .push_bind(operation.operation_index)
                    .push_bind(&operation.source_account)
                    .push_bind(&operation.operation_type)
                    .push_bind(Json(&operation.details));
            })
            .push(indoc! {"
                ON CONFLICT (id) DO UPDATE SET
                    tx_hash = EXCLUDED.tx_hash,
                    operation_index = EXCLUDED.operation_index,
                    source_account = EXCLUDED.source_account,
                    operation_type = EXCLUDED.operation_type,
                    operation_details = EXCLUDED.operation_details,
                    updated_at = now()
            "})
            .build()
            .execute(&mut **tx)
            .await?;
    }

    Ok(())
}

#[trace]
async fn upsert_contract_data(
    entries: &[ContractDataEntryRecord],
    tx: &mut Tx,
) -> Result<(), sqlx::Error> {
    let entries = dedup_last_by(entries, |entry| entry.key_hash.clone());

    for chunk in entries.chunks(CHUNK_SIZE) {
        let query = indoc! {"
            INSERT INTO contract_data_entries (
                key_hash,
                contract_id,
                key,
                key_xdr,
                val,
                val_xdr,
                durability,
                expiration_ledger_seq,
                flags
            )
        "};

        QueryBuilder::new(query)
            .push_values(chunk, |mut q, entry| {
                q.push_bind(&entry.key_hash)
                    .push_bind(&entry.contract_id)
                    .push_bind(Json(&entry.key))
                    .push_bind(&entry.key_xdr)
                    .push_bind(Json(&entry.val))
                    .push_bind(&entry.val_xdr)
                    .push_bind(&entry.durability)
                    .push_bind(entry.expiration_ledger_seq as i64)
                    .push_bind(entry.flags as i64);
            })
            .push(indoc! {"
                ON CONFLICT (key_hash) DO UPDATE SET
                    contract_id = EXCLUDED.contract_id,
                    key = EXCLUDED.key,
                    key_xdr = EXCLUDED.key_xdr,
                    val = EXCLUDED.val,
                    val_xdr = EXCLUDED.val_xdr,
                    durability = EXCLUDED.durability,
                    expiration_ledger_seq = EXCLUDED.expiration_ledger_seq,
                    flags = EXCLUDED.flags,
                    updated_at = now()
            "})
            .build()
            .execute(&mut **tx)
            .await?;
    }

    Ok(())
}

// Contract code is content-addressed and immutable: re-observation is a no-op.
#[trace]
async fn insert_contract_code(
    codes: &[ContractCodeRecord],
    tx: &mut Tx,
) -> Result<(), sqlx::Error> {
    let codes = dedup_last_by(codes, |code| code.hash.clone());

    for chunk in codes.chunks(CHUNK_SIZE) {
        let query = indoc! {"
            INSERT INTO contract_code (
                hash,
                wasm,
                deployed_at,
                ledger,
                tx_hash,
                size_bytes
            )
        "};

        QueryBuilder::new(query)
            .push_values(chunk, |mut q, code| {
                q.push_bind(&code.hash)
                    .push_bind(&code.wasm)
                    .push_bind(code.deployed_at)
                    .push_bind(code.ledger as i64)
                    .push_bind(&code.tx_hash)
                    .push_bind(code.size_bytes);
            })
            .push(" ON CONFLICT (hash) DO NOTHING")
            .build()
            .execute(&mut **tx)
            .await?;
    }

    Ok(())
}

#[trace]
async fn upsert_token_operations(
    operations: &[TokenOperationRecord],
    tx: &mut Tx,
) -> Result<(), sqlx::Error> {
    let operations = dedup_last_by(operations, |operation| operation.id.clone());

    for chunk in operations.chunks(CHUNK_SIZE) {
        let query = indoc! {"
            INSERT INTO token_operations (
                id,
                type,
                tx_index,
                ledger,
                ledger_closed_at,
                contract_id,
                from_address,
                to_address,
                amount,
                authorized,
                expiration_ledger
            )
        "};

        QueryBuilder::new(query)
            .push_values(chunk, |mut q, operation| {
                q.push_bind(&operation.id)
                    .push_bind(&operation.op_type)
                    .push_bind(operation.tx_index)
                    .push_bind(operation.ledger as i64)
                    .push_bind(&operation.ledger_closed_at)
                    .push_bind(&operation.contract_id)
                    .push_bind(&operation.from)
                    .push_bind(&operation.to)
                    .push_bind(&operation.amount)
                    .push_bind(operation.authorized)
                    .push_bind(
                        operation
                            .expiration_ledger
                            .map(|expiration| expiration as i64),
                    );
            })
            .push(indoc! {"
                ON CONFLICT (id) DO UPDATE SET
                    type = EXCLUDED.type,
                    tx_index = EXCLUDED.tx_index,
                    ledger = EXCLUDED.ledger,
                    ledger_closed_at = EXCLUDED.ledger_closed_at,
                    contract_id = EXCLUDED.contract_id,
                    from_address = EXCLUDED.from_address,
                    to_address = EXCLUDED.to_address,
                    amount = EXCLUDED.amount,
                    authorized = EXCLUDED.authorized,
                    expiration_ledger = EXCLUDED.expiration_ledger,
                    updated_at = now()
            "})
            .build()
            .execute(&mut **tx)
            .await?;
    }

    Ok(())
}

#[trace]
async fn upsert_token_metadata(
    metadata: &[TokenMetadataRecord],
    tx: &mut Tx,
) -> Result<(), sqlx::Error> {
    let metadata = dedup_last_by(metadata, |record| record.contract_id.clone());

    for chunk in metadata.chunks(CHUNK_SIZE) {
        let query = indoc! {"
            INSERT INTO token_metadata (
                contract_id,
                name,
                symbol,
                decimal,
                admin_address
            )
        "};

        QueryBuilder::new(query)
            .push_values(chunk, |mut q, record| {
                q.push_bind(&record.contract_id)
                    .push_bind(&record.name)
                    .push_bind(&record.symbol)
                    .push_bind(record.decimal as i64)
                    .push_bind(&record.admin_address);
            })
            .push(indoc! {"
                ON CONFLICT (contract_id) DO UPDATE SET
                    name = EXCLUDED.name,
                    symbol = EXCLUDED.symbol,
                    decimal = EXCLUDED.decimal,
                    admin_address = EXCLUDED.admin_address,
                    updated_at = now()
            "})
            .build()
            .execute(&mut **tx)
            .await?;
    }

    Ok(())
}

#[trace]
async fn upsert_token_balances(
    balances: &[TokenBalanceRecord],
    tx: &mut Tx,
) -> Result<(), sqlx::Error> {
    let balances = dedup_last_by(balances, |balance| {
        format!("{}|{}", balance.contract_id, balance.address)
    });

    for chunk in balances.chunks(CHUNK_SIZE) {
        let query = indoc! {"
            INSERT INTO token_balances (
                contract_id,
                address,
                balance
            )
        "};

        QueryBuilder::new(query)
            .push_values(chunk, |mut q, balance| {
                q.push_bind(&balance.contract_id)
                    .push_bind(&balance.address)
                    .push_bind(&balance.balance);
            })
            .push(indoc! {"
                ON CONFLICT (contract_id, address) DO UPDATE SET
                    balance = EXCLUDED.balance,
                    updated_at = now()
            "})
            .build()
            .execute(&mut **tx)
            .await?;
    }

    Ok(())
}

#[trace]
async fn upsert_account_entries(
    entries: &[AccountEntryRecord],
    tx: &mut Tx,
) -> Result<(), sqlx::Error> {
    let entries = dedup_last_by(entries, |entry| entry.account_id.clone());

    for chunk in entries.chunks(CHUNK_SIZE) {
        let query = indoc! {"
            INSERT INTO account_entries (
                account_id,
                balance,
                seq_num,
                num_sub_entries,
                inflation_dest,
                flags,
                home_domain,
                thresholds,
                signers,
                last_modified_ledger_seq,
                sponsoring_id
            )
        "};

        QueryBuilder::new(query)
            .push_values(chunk, |mut q, entry| {
                q.push_bind(&entry.account_id)
                    .push_bind(entry.balance)
                    .push_bind(entry.seq_num)
                    .push_bind(entry.num_sub_entries as i64)
                    .push_bind(&entry.inflation_dest)
                    .push_bind(entry.flags as i64)
                    .push_bind(&entry.home_domain)
                    .push_bind(&entry.thresholds)
                    .push_bind(Json(&entry.signers))
                    .push_bind(entry.last_modified_ledger_seq as i64)
                    .push_bind(&entry.sponsoring_id);
            })
            .push(indoc! {"
                ON CONFLICT (account_id) DO UPDATE SET
                    balance = EXCLUDED.balance,
                    seq_num = EXCLUDED.seq_num,
                    num_sub_entries = EXCLUDED.num_sub_entries,
                    inflation_dest = EXCLUDED.inflation_dest,
                    flags = EXCLUDED.flags,
                    home_domain = EXCLUDED.home_domain,
                    thresholds = EXCLUDED.thresholds,
                    signers = EXCLUDED.signers,
                    last_modified_ledger_seq = EXCLUDED.last_modified_ledger_seq,
                    sponsoring_id = EXCLUDED.sponsoring_id,
                    updated_at = now()
            "})
            .build()
            .execute(&mut **tx)
            .await?;
    }

    Ok(())
}

#[trace]
async fn upsert_trust_line_entries(
    entries: &[TrustLineEntryRecord],
    tx: &mut Tx,
) -> Result<(), sqlx::Error> {
    let entries = dedup_last_by(entries, |entry| {
        format!("{}|{}", entry.account_id, entry.asset_key)
    });

    for chunk in entries.chunks(CHUNK_SIZE) {
        let query = indoc! {"
            INSERT INTO trust_line_entries (
                account_id,
                asset_key,
                asset_type,
                asset_code,
                asset_issuer,
                liquidity_pool_id,
                balance,
                limit_amount,
                flags,
                last_modified_ledger_seq,
                sponsoring_id
            )
        "};

        QueryBuilder::new(query)
            .push_values(chunk, |mut q, entry| {
                q.push_bind(&entry.account_id)
                    .push_bind(&entry.asset_key)
                    .push_bind(entry.asset_type)
                    .push_bind(&entry.asset_code)
                    .push_bind(&entry.asset_issuer)
                    .push_bind(&entry.liquidity_pool_id)
                    .push_bind(entry.balance)
                    .push_bind(entry.limit)
                    .push_bind(entry.flags as i64)
                    .push_bind(entry.last_modified_ledger_seq as i64)
                    .push_bind(&entry.sponsoring_id);
            })
            .push(indoc! {"
                ON CONFLICT (account_id, asset_key) DO UPDATE SET
                    asset_type = EXCLUDED.asset_type,
                    asset_code = EXCLUDED.asset_code,
                    asset_issuer = EXCLUDED.asset_issuer,
                    liquidity_pool_id = EXCLUDED.liquidity_pool_id,
                    balance = EXCLUDED.balance,
                    limit_amount = EXCLUDED.limit_amount,
                    flags = EXCLUDED.flags,
                    last_modified_ledger_seq = EXCLUDED.last_modified_ledger_seq,
                    sponsoring_id = EXCLUDED.sponsoring_id,
                    updated_at = now()
            "})
            .build()
            .execute(&mut **tx)
            .await?;
    }

    Ok(())
}

#[trace]
async fn upsert_offer_entries(
    entries: &[OfferEntryRecord],
    tx: &mut Tx,
) -> Result<(), sqlx::Error> {
    let entries = dedup_last_by(entries, |entry| entry.offer_id.to_string());

    for chunk in entries.chunks(CHUNK_SIZE) {
        let query = indoc! {"
            INSERT INTO offer_entries (
                offer_id,
                seller_id,
                selling_asset_type,
                selling_asset_code,
                selling_asset_issuer,
                buying_asset_type,
                buying_asset_code,
                buying_asset_issuer,
                amount,
                price,
                flags,
                last_modified_ledger_seq,
                sponsoring_id
            )
        "};

        QueryBuilder::new(query)
            .push_values(chunk, |mut q, entry| {
                q.push_bind(entry.offer_id)
                    .push_bind(&entry.seller_id)
                    .push_bind(entry.selling_asset_type)
                    .push_bind(&entry.selling_asset_code)
                    .push_bind(&entry.selling_asset_issuer)
                    .push_bind(entry.buying_asset_type)
                    .push_bind(&entry.buying_asset_code)
                    .push_bind(&entry.buying_asset_issuer)
                    .push_bind(entry.amount)
                    .push_bind(&entry.price)
                    .push_bind(entry.flags as i64)
                    .push_bind(entry.last_modified_ledger_seq as i64)
                    .push_bind(&entry.sponsoring_id);
            })
            .push(indoc! {"
                ON CONFLICT (offer_id) DO UPDATE SET
                    seller_id = EXCLUDED.seller_id,
                    selling_asset_type = EXCLUDED.selling_asset_type,
                    selling_asset_code = EXCLUDED.selling_asset_code,
                    selling_asset_issuer = EXCLUDED.selling_asset_issuer,
                    buying_asset_type = EXCLUDED.buying_asset_type,
                    buying_asset_code = EXCLUDED.buying_asset_code,
                    buying_asset_issuer = EXCLUDED.buying_asset_issuer,
                    amount = EXCLUDED.amount,
                    price = EXCLUDED.price,
                    flags = EXCLUDED.flags,
                    last_modified_ledger_seq = EXCLUDED.last_modified_ledger_seq,
                    sponsoring_id = EXCLUDED.sponsoring_id,
                    updated_at = now()
            "})
            .build()
            .execute(&mut **tx)
            .await?;
    }

    Ok(())
}

#[trace]
async fn upsert_account_data_entries(
    entries: &[AccountDataEntryRecord],
    tx: &mut Tx,
) -> Result<(), sqlx::Error> {
    let entries = dedup_last_by(entries, |entry| {
        format!("{}|{}", entry.account_id, entry.data_name)
    });

    for chunk in entries.chunks(CHUNK_SIZE) {
        let query = indoc! {"
            INSERT INTO account_data_entries (
                account_id,
                data_name,
                data_value,
                last_modified_ledger_seq,
                sponsoring_id
            )
        "};

        QueryBuilder::new(query)
            .push_values(chunk, |mut q, entry| {
                q.push_bind(&entry.account_id)
                    .push_bind(&entry.data_name)
                    .push_bind(&entry.data_value)
                    .push_bind(entry.last_modified_ledger_seq as i64)
                    .push_bind(&entry.sponsoring_id);
            })
            .push(indoc! {"
                ON CONFLICT (account_id, data_name) DO UPDATE SET
                    data_value = EXCLUDED.data_value,
                    last_modified_ledger_seq = EXCLUDED.last_modified_ledger_seq,
                    sponsoring_id = EXCLUDED.sponsoring_id,
                    updated_at = now()
            "})
            .build()
            .execute(&mut **tx)
            .await?;
    }

    Ok(())
}

#[trace]
async fn upsert_claimable_balance_entries(
    entries: &[ClaimableBalanceEntryRecord],
    tx: &mut Tx,
) -> Result<(), sqlx::Error> {
    let entries = dedup_last_by(entries, |entry| entry.balance_id.clone());

    for chunk in entries.chunks(CHUNK_SIZE) {
        let query = indoc! {"
            INSERT INTO claimable_balance_entries (
                balance_id,
                claimants,
                asset_type,
                asset_code,
                asset_issuer,
                amount,
                flags,
                last_modified_ledger_seq,
                sponsoring_id
            )
        "};

        QueryBuilder::new(query)
            .push_values(chunk, |mut q, entry| {
                q.push_bind(&entry.balance_id)
                    .push_bind(Json(&entry.claimants))
                    .push_bind(entry.asset_type)
                    .push_bind(&entry.asset_code)
                    .push_bind(&entry.asset_issuer)
                    .push_bind(entry.amount)
                    .push_bind(entry.flags as i64)
                    .push_bind(entry.last_modified_ledger_seq as i64)
                    .push_bind(&entry.sponsoring_id);
            })
            .push(indoc! {"
                ON CONFLICT (balance_id) DO UPDATE SET
                    claimants = EXCLUDED.claimants,
                    asset_type = EXCLUDED.asset_type,
                    asset_code = EXCLUDED.asset_code,
                    asset_issuer = EXCLUDED.asset_issuer,
                    amount = EXCLUDED.amount,
                    flags = EXCLUDED.flags,
                    last_modified_ledger_seq = EXCLUDED.last_modified_ledger_seq,
                    sponsoring_id = EXCLUDED.sponsoring_id,
                    updated_at = now()
            "})
            .build()
            .execute(&mut **tx)
            .await?;
    }

    Ok(())
}

#[trace]
async fn upsert_liquidity_pool_entries(
    entries: &[LiquidityPoolEntryRecord],
    tx: &mut Tx,
) -> Result<(), sqlx::Error> {
    let entries = dedup_last_by(entries, |entry| entry.liquidity_pool_id.clone());

    for chunk in entries.chunks(CHUNK_SIZE) {
        let query = indoc! {"
            INSERT INTO liquidity_pool_entries (
                liquidity_pool_id,
                fee,
                reserve_a,
                reserve_b,
                total_pool_shares,
                pool_shares_trust_line_count,
                asset_a_type,
                asset_a_code,
                asset_a_issuer,
                asset_b_type,
                asset_b_code,
                asset_b_issuer,
                last_modified_ledger_seq,
                sponsoring_id
            )
        "};

        QueryBuilder::new(query)
            .push_values(chunk, |mut q, entry| {
                q.push_bind(&entry.liquidity_pool_id)
                    .push_bind(entry.fee)
                    .push_bind(entry.reserve_a)
                    .push_bind(entry.reserve_b)
                    .push_bind(entry.total_pool_shares)
                    .push_bind(entry.pool_shares_trust_line_count)
                    .push_bind(entry.asset_a_type)
                    .push_bind(&entry.asset_a_code)
                    .push_bind(&entry.asset_a_issuer)
                    .push_bind(entry.asset_b_type)
                    .push_bind(&entry.asset_b_code)
                    .push_bind(&entry.asset_b_issuer)
                    .push_bind(entry.last_modified_ledger_seq as i64)
                    .push_bind(&entry.sponsoring_id);
            })
            .push(indoc! {"
                ON CONFLICT (liquidity_pool_id) DO UPDATE SET
                    fee = EXCLUDED.fee,
                    reserve_a = EXCLUDED.reserve_a,
                    reserve_b = EXCLUDED.reserve_b,
                    total_pool_shares = EXCLUDED.total_pool_shares,
                    pool_shares_trust_line_count = EXCLUDED.pool_shares_trust_line_count,
                    asset_a_type = EXCLUDED.asset_a_type,
                    asset_a_code = EXCLUDED.asset_a_code,
                    asset_a_issuer = EXCLUDED.asset_a_issuer,
                    asset_b_type = EXCLUDED.asset_b_type,
                    asset_b_code = EXCLUDED.asset_b_code,
                    asset_b_issuer = EXCLUDED.asset_b_issuer,
                    last_modified_ledger_seq = EXCLUDED.last_modified_ledger_seq,
                    sponsoring_id = EXCLUDED.sponsoring_id,
                    updated_at = now()
            "})
            .build()
            .execute(&mut **tx)
            .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::infra::storage::postgres::dedup_last_by;

    #[test]
    fn test_dedup_last_wins_preserving_order() {
        let items = vec![("a", 1), ("b", 2), ("a", 3), ("c", 4)];
        let deduped = dedup_last_by(&items, |(key, _)| key.to_string());

        assert_eq!(
            deduped.into_iter().copied().collect::<Vec<_>>(),
            vec![("a", 3), ("b", 2), ("c", 4)]
        );
    }

    #[test]
    fn test_dedup_empty() {
        let items: Vec<(String, u32)> = Vec::new();
        assert!(dedup_last_by(&items, |(key, _)| key.clone()).is_empty());
    }
}
