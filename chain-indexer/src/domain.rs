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

//! Domain records from the perspective of the Chain Indexer.
//!
//! Every record is keyed on an identifier the chain itself produces, so ingestion is naturally
//! idempotent by primary key. Records live in memory for the duration of one tick and are
//! materialized atomically by the storage.

pub mod node;
pub mod parser;
pub mod storage;
pub mod token;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A contract event as stored, with topics and value already projected to JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// `<ledger:010>-<index:010>`.
    pub id: String,
    pub tx_index: i32,
    pub event_type: String,
    pub ledger: u32,
    pub ledger_closed_at: String,
    pub contract_id: String,
    pub paging_token: String,
    pub topic: Value,
    pub value: Value,
    pub in_successful_contract_call: bool,
    pub last_modified_ledger_seq: u32,
}

/// A transaction as stored, keyed by the authoritative hash computed over its envelope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub status: String,
    pub ledger: Option<u32>,
    pub ledger_created_at: Option<i64>,
    pub application_order: Option<i32>,
    pub fee_bump: Option<bool>,
    pub fee_bump_info: Option<FeeBumpInfo>,
    pub fee: Option<i64>,
    pub fee_charged: Option<i64>,
    pub sequence: Option<i64>,
    pub source_account: Option<String>,
    pub muxed_account_id: Option<i64>,
    pub memo: Option<TypedValue>,
    pub preconditions: Option<PreconditionsRecord>,
    pub signatures: Option<Vec<SignatureRecord>>,
}

/// A typed scalar, used for memos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedValue {
    #[serde(rename = "type")]
    pub value_type: String,
    pub value: String,
}

/// Min/max bounds for time or ledger preconditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: i64,
    pub max: i64,
}

/// A signer key within transaction preconditions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignerKeyRecord {
    #[serde(rename = "type")]
    pub key_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ed25519: Option<String>,

    #[serde(rename = "pre_auth_tx", skip_serializing_if = "Option::is_none")]
    pub pre_auth_tx: Option<String>,

    #[serde(rename = "hash_x", skip_serializing_if = "Option::is_none")]
    pub hash_x: Option<String>,

    #[serde(rename = "ed25519_signed_payload", skip_serializing_if = "Option::is_none")]
    pub ed25519_signed_payload: Option<String>,
}

/// Transaction preconditions as stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreconditionsRecord {
    #[serde(rename = "time_bounds", skip_serializing_if = "Option::is_none")]
    pub time_bounds: Option<Bounds>,

    #[serde(rename = "ledger_bounds", skip_serializing_if = "Option::is_none")]
    pub ledger_bounds: Option<Bounds>,

    #[serde(rename = "min_seq_num", skip_serializing_if = "Option::is_none")]
    pub min_seq_num: Option<i64>,

    #[serde(rename = "min_seq_age", skip_serializing_if = "Option::is_none")]
    pub min_seq_age: Option<i64>,

    #[serde(rename = "min_seq_ledger_gap", skip_serializing_if = "Option::is_none")]
    pub min_seq_ledger_gap: Option<i32>,

    #[serde(rename = "extra_signers", skip_serializing_if = "Option::is_none")]
    pub extra_signers: Option<Vec<SignerKeyRecord>>,
}

/// One decorated signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureRecord {
    pub hint: String,
    pub signature: String,
}

/// The outer fee information of a fee-bump transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeeBumpInfo {
    pub fee: i64,

    #[serde(rename = "source_account", skip_serializing_if = "Option::is_none")]
    pub source_account: Option<String>,

    #[serde(rename = "muxed_account_id", skip_serializing_if = "Option::is_none")]
    pub muxed_account_id: Option<i64>,
}

/// One operation of a transaction, keyed `<tx_hash>-<index>`.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRecord {
    pub id: String,
    pub tx_hash: String,
    pub operation_index: i32,
    pub source_account: String,
    pub operation_type: String,
    pub details: Value,
}

/// A contract-storage cell, keyed by the SHA-256 of its canonical ledger key.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractDataEntryRecord {
    pub key_hash: String,
    pub contract_id: String,
    pub key: Value,
    pub key_xdr: String,
    pub val: Value,
    pub val_xdr: String,
    pub durability: String,
    pub expiration_ledger_seq: u32,
    pub flags: u32,
}

/// An uploaded WASM blob, content-addressed and immutable.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractCodeRecord {
    pub hash: String,
    pub wasm: Vec<u8>,
    pub deployed_at: i64,
    pub ledger: u32,
    pub tx_hash: String,
    pub size_bytes: i64,
}

/// Token metadata derived from a contract instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenMetadataRecord {
    pub contract_id: String,
    pub name: String,
    pub symbol: String,
    pub decimal: u32,
    pub admin_address: String,
}

/// One holder's balance of one token contract.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenBalanceRecord {
    pub contract_id: String,
    pub address: String,
    pub balance: String,
}

/// A token-semantic operation derived from an event, keyed by the event id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenOperationRecord {
    pub id: String,
    pub op_type: String,
    pub tx_index: i32,
    pub ledger: u32,
    pub ledger_closed_at: String,
    pub contract_id: String,
    pub from: String,
    pub to: Option<String>,
    /// 128-bit amount as a decimal string.
    pub amount: Option<String>,
    pub authorized: Option<bool>,
    pub expiration_ledger: Option<u32>,
}

/// A classic account.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountEntryRecord {
    pub account_id: String,
    pub balance: i64,
    pub seq_num: i64,
    pub num_sub_entries: u32,
    pub inflation_dest: Option<String>,
    pub flags: u32,
    pub home_domain: String,
    pub thresholds: Vec<u8>,
    pub signers: Value,
    pub last_modified_ledger_seq: u32,
    pub sponsoring_id: Option<String>,
}

/// A classic trust line, keyed by account and a canonical asset key.
#[derive(Debug, Clone, PartialEq)]
pub struct TrustLineEntryRecord {
    pub account_id: String,
    pub asset_key: String,
    pub asset_type: i32,
    pub asset_code: Option<String>,
    pub asset_issuer: Option<String>,
    pub liquidity_pool_id: Option<String>,
    pub balance: i64,
    pub limit: i64,
    pub flags: u32,
    pub last_modified_ledger_seq: u32,
    pub sponsoring_id: Option<String>,
}

/// A classic order-book offer.
#[derive(Debug, Clone, PartialEq)]
pub struct OfferEntryRecord {
    pub offer_id: i64,
    pub seller_id: String,
    pub selling_asset_type: i32,
    pub selling_asset_code: Option<String>,
    pub selling_asset_issuer: Option<String>,
    pub buying_asset_type: i32,
    pub buying_asset_code: Option<String>,
    pub buying_asset_issuer: Option<String>,
    pub amount: i64,
    /// Rational `"N/D"` form, never evaluated to a decimal.
    pub price: String,
    pub flags: u32,
    pub last_modified_ledger_seq: u32,
    pub sponsoring_id: Option<String>,
}

/// A named data entry attached to an account.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountDataEntryRecord {
    pub account_id: String,
    pub data_name: String,
    pub data_value: Vec<u8>,
    pub last_modified_ledger_seq: u32,
    pub sponsoring_id: Option<String>,
}

/// A claimable balance.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimableBalanceEntryRecord {
    pub balance_id: String,
    pub claimants: Value,
    pub asset_type: i32,
    pub asset_code: Option<String>,
    pub asset_issuer: Option<String>,
    pub amount: i64,
    pub flags: u32,
    pub last_modified_ledger_seq: u32,
    pub sponsoring_id: Option<String>,
}

/// A constant-product liquidity pool.
#[derive(Debug, Clone, PartialEq)]
pub struct LiquidityPoolEntryRecord {
    pub liquidity_pool_id: String,
    pub fee: i32,
    pub reserve_a: i64,
    pub reserve_b: i64,
    pub total_pool_shares: i64,
    pub pool_shares_trust_line_count: i64,
    pub asset_a_type: i32,
    pub asset_a_code: Option<String>,
    pub asset_a_issuer: Option<String>,
    pub asset_b_type: i32,
    pub asset_b_code: Option<String>,
    pub asset_b_issuer: Option<String>,
    pub last_modified_ledger_seq: u32,
    pub sponsoring_id: Option<String>,
}

/// A parsed ledger entry projected to its domain record.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerEntryRecord {
    ContractData(ContractDataEntryRecord),
    Account(AccountEntryRecord),
    TrustLine(TrustLineEntryRecord),
    Offer(OfferEntryRecord),
    Data(AccountDataEntryRecord),
    ClaimableBalance(ClaimableBalanceEntryRecord),
    LiquidityPool(LiquidityPoolEntryRecord),
}

/// Everything one tick materializes, committed atomically together with the cursor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickBatch {
    pub events: Vec<Event>,
    pub transactions: Vec<Transaction>,
    pub operations: Vec<OperationRecord>,
    pub contract_data: Vec<ContractDataEntryRecord>,
    pub contract_code: Vec<ContractCodeRecord>,
    pub token_operations: Vec<TokenOperationRecord>,
    pub token_metadata: Vec<TokenMetadataRecord>,
    pub token_balances: Vec<TokenBalanceRecord>,
    pub account_entries: Vec<AccountEntryRecord>,
    pub trust_line_entries: Vec<TrustLineEntryRecord>,
    pub offer_entries: Vec<OfferEntryRecord>,
    pub account_data_entries: Vec<AccountDataEntryRecord>,
    pub claimable_balance_entries: Vec<ClaimableBalanceEntryRecord>,
    pub liquidity_pool_entries: Vec<LiquidityPoolEntryRecord>,
}

impl TickBatch {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
            && self.transactions.is_empty()
            && self.operations.is_empty()
            && self.contract_data.is_empty()
            && self.contract_code.is_empty()
            && self.token_operations.is_empty()
            && self.token_metadata.is_empty()
            && self.token_balances.is_empty()
            && self.account_entries.is_empty()
            && self.trust_line_entries.is_empty()
            && self.offer_entries.is_empty()
            && self.account_data_entries.is_empty()
            && self.claimable_balance_entries.is_empty()
            && self.liquidity_pool_entries.is_empty()
    }

    /// Sort the parsed ledger entry into its batch bucket.
    pub fn push_ledger_entry(&mut self, record: LedgerEntryRecord) {
        match record {
            LedgerEntryRecord::ContractData(record) => self.contract_data.push(record),
            LedgerEntryRecord::Account(record) => self.account_entries.push(record),
            LedgerEntryRecord::TrustLine(record) => self.trust_line_entries.push(record),
            LedgerEntryRecord::Offer(record) => self.offer_entries.push(record),
            LedgerEntryRecord::Data(record) => self.account_data_entries.push(record),
            LedgerEntryRecord::ClaimableBalance(record) => {
                self.claimable_balance_entries.push(record)
            }
            LedgerEntryRecord::LiquidityPool(record) => self.liquidity_pool_entries.push(record),
        }
    }
}

/// Aggregate counts surfaced on the stats endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    #[serde(rename = "lastLedger")]
    pub last_ledger: u32,

    #[serde(rename = "totalEvents")]
    pub total_events: i64,

    #[serde(rename = "totalTransactions")]
    pub total_transactions: i64,

    #[serde(rename = "totalTokenOps")]
    pub total_token_ops: i64,

    #[serde(rename = "totalContractData")]
    pub total_contract_data: i64,
}
