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

//! The artifact parser: binary wire artifacts into domain records.
//!
//! Parsing is defensive throughout. A malformed artifact fails only itself; callers log and
//! move on with the remainder of the tick.

use crate::domain::{
    AccountDataEntryRecord, AccountEntryRecord, Bounds, ClaimableBalanceEntryRecord,
    ContractCodeRecord, ContractDataEntryRecord, Event, FeeBumpInfo, LedgerEntryRecord,
    LiquidityPoolEntryRecord, OfferEntryRecord, OperationRecord, PreconditionsRecord,
    SignatureRecord, SignerKeyRecord, Transaction, TrustLineEntryRecord, TypedValue,
    node::{EventItem, LedgerEntryItem, TransactionInfo},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use indexer_common::domain::{
    NetworkId,
    scval::ScVal,
    sha256,
    xdr::{
        Asset, ChangeTrustAsset, ClaimPredicate, Claimant, XdrError,
        envelope::{
            HostFunction, Memo, Operation, OperationBody, Preconditions, RevokeSponsorship,
            TransactionEnvelope,
        },
        ledger::{
            ContractDataEntry as XdrContractDataEntry, LedgerEntry, LedgerEntryData, Signer,
        },
        meta::{TransactionMeta, TransactionResult},
    },
};
use serde_json::{Map, Value, json};
use thiserror::Error;

/// Error possibly returned when parsing a wire artifact.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("artifact is not valid base64")]
    Base64(#[source] base64::DecodeError),

    #[error("cannot decode artifact")]
    Xdr(#[from] XdrError),
}

fn decode_base64(artifact: &str) -> Result<Vec<u8>, ParseError> {
    BASE64.decode(artifact).map_err(ParseError::Base64)
}

/// Decode a base64-encoded transaction envelope.
pub fn decode_envelope(envelope_xdr: &str) -> Result<TransactionEnvelope, ParseError> {
    let bytes = decode_base64(envelope_xdr)?;
    Ok(TransactionEnvelope::from_bytes(&bytes)?)
}

/// Compute the authoritative transaction hash from the envelope under the active network.
pub fn compute_transaction_hash(
    envelope_xdr: &str,
    network_id: NetworkId,
) -> Result<String, ParseError> {
    Ok(decode_envelope(envelope_xdr)?.hash_hex(network_id))
}

/// Convert an RPC event into its stored record.
///
/// Topics and value decode from their wire form to JSON; an undecodable artifact keeps its raw
/// base64 string so nothing is silently dropped.
pub fn parse_event(item: &EventItem) -> Event {
    let topics = item
        .topic
        .iter()
        .map(|topic| {
            decode_scval_json(topic).unwrap_or_else(|| Value::String(topic.clone()))
        })
        .collect::<Vec<_>>();

    let value = if item.value.is_empty() {
        Value::Null
    } else {
        decode_scval_json(&item.value).unwrap_or_else(|| Value::String(item.value.clone()))
    };

    Event {
        id: item.id.clone(),
        tx_index: event_tx_index(&item.id),
        event_type: item.event_type.clone(),
        ledger: item.ledger,
        ledger_closed_at: item.ledger_closed_at.clone(),
        contract_id: item.contract_id.clone(),
        paging_token: item.paging_token.clone(),
        topic: Value::Array(topics),
        value,
        in_successful_contract_call: item.in_successful_contract_call,
        last_modified_ledger_seq: item.ledger,
    }
}

fn decode_scval_json(artifact: &str) -> Option<Value> {
    let bytes = BASE64.decode(artifact).ok()?;
    let val = ScVal::from_bytes(&bytes).ok()?;
    Some(val.to_json())
}

// Event ids have the form `<ledger:010>-<index:010>`.
fn event_tx_index(event_id: &str) -> i32 {
    event_id
        .split_once('-')
        .and_then(|(_, index)| index.parse::<i32>().ok())
        .unwrap_or_default()
}

/// Convert an RPC transaction into its stored record under the given authoritative hash.
///
/// The envelope is decoded by the caller (and shared with the operation and contract-code
/// extractors); an undecodable result artifact degrades to a zero charged fee.
pub fn parse_transaction(
    info: &TransactionInfo,
    envelope: &TransactionEnvelope,
    tx_hash: &str,
) -> Transaction {
    let fee_source = envelope.fee_source();
    let fee_bump_info = match envelope {
        TransactionEnvelope::FeeBump(_) => Some(FeeBumpInfo {
            fee: envelope.fee(),
            source_account: Some(fee_source.account_address()),
            muxed_account_id: fee_source.muxed_id().map(|id| id as i64),
        }),
        _ => None,
    };

    let fee_charged = decode_base64(&info.result_xdr)
        .ok()
        .and_then(|bytes| TransactionResult::from_bytes(&bytes).ok())
        .map(|result| result.fee_charged)
        .unwrap_or_default();

    Transaction {
        id: tx_hash.to_string(),
        status: info.status.clone(),
        ledger: Some(info.ledger),
        ledger_created_at: Some(info.ledger_close_time),
        application_order: Some(info.application_order),
        fee_bump: Some(envelope.is_fee_bump()),
        fee_bump_info,
        fee: Some(envelope.fee()),
        fee_charged: Some(fee_charged),
        sequence: Some(envelope.seq_num()),
        source_account: Some(fee_source.account_address()),
        muxed_account_id: fee_source.muxed_id().map(|id| id as i64),
        memo: memo_record(envelope.memo()),
        preconditions: preconditions_record(&envelope.preconditions()),
        signatures: signatures_record(envelope),
    }
}

fn memo_record(memo: &Memo) -> Option<TypedValue> {
    let (value_type, value) = match memo {
        Memo::None => return None,
        Memo::Text(text) => ("text", text.clone()),
        Memo::Id(id) => ("id", id.to_string()),
        Memo::Hash(hash) => ("hash", const_hex::encode(hash)),
        Memo::Return(hash) => ("return", const_hex::encode(hash)),
    };

    Some(TypedValue {
        value_type: value_type.to_string(),
        value,
    })
}

fn preconditions_record(cond: &Preconditions) -> Option<PreconditionsRecord> {
    match cond {
        Preconditions::None => None,
        Preconditions::Time(time_bounds) => Some(PreconditionsRecord {
            time_bounds: Some(Bounds {
                min: time_bounds.min_time as i64,
                max: time_bounds.max_time as i64,
            }),
            ..Default::default()
        }),
        Preconditions::V2(v2) => {
            let extra_signers = (!v2.extra_signers.is_empty()).then(|| {
                v2.extra_signers
                    .iter()
                    .map(|signer| {
                        use indexer_common::domain::xdr::SignerKey;

                        let mut record = SignerKeyRecord {
                            key_type: signer.type_name().to_string(),
                            ..Default::default()
                        };
                        match signer {
                            SignerKey::Ed25519(key) => {
                                record.ed25519 = Some(BASE64.encode(key));
                            }
                            SignerKey::PreAuthTx(hash) => {
                                record.pre_auth_tx = Some(BASE64.encode(hash));
                            }
                            SignerKey::HashX(hash) => {
                                record.hash_x = Some(BASE64.encode(hash));
                            }
                            SignerKey::Ed25519SignedPayload { ed25519, .. } => {
                                record.ed25519_signed_payload = Some(BASE64.encode(ed25519));
                            }
                        }
                        record
                    })
                    .collect()
            });

            Some(PreconditionsRecord {
                time_bounds: v2.time_bounds.map(|bounds| Bounds {
                    min: bounds.min_time as i64,
                    max: bounds.max_time as i64,
                }),
                ledger_bounds: v2.ledger_bounds.map(|bounds| Bounds {
                    min: bounds.min_ledger as i64,
                    max: bounds.max_ledger as i64,
                }),
                min_seq_num: v2.min_seq_num,
                min_seq_age: Some(v2.min_seq_age as i64),
                min_seq_ledger_gap: Some(v2.min_seq_ledger_gap as i32),
                extra_signers,
            })
        }
    }
}

fn signatures_record(envelope: &TransactionEnvelope) -> Option<Vec<SignatureRecord>> {
    let signatures = envelope.signatures();
    if signatures.is_empty() {
        return None;
    }

    Some(
        signatures
            .iter()
            .map(|signature| SignatureRecord {
                hint: const_hex::encode(signature.hint),
                signature: BASE64.encode(&signature.signature),
            })
            .collect(),
    )
}

/// Extract all operations of the envelope as stored records, keyed `<tx_hash>-<index>`.
pub fn parse_operations(tx_hash: &str, envelope: &TransactionEnvelope) -> Vec<OperationRecord> {
    let fallback_source = envelope.operation_source();

    envelope
        .operations()
        .iter()
        .enumerate()
        .map(|(index, operation)| {
            let source_account = operation
                .source_account
                .as_ref()
                .map(|source| source.address())
                .unwrap_or_else(|| fallback_source.address());

            OperationRecord {
                id: format!("{tx_hash}-{index}"),
                tx_hash: tx_hash.to_string(),
                operation_index: index as i32,
                source_account,
                operation_type: operation.body.type_name().to_string(),
                details: operation_details(operation),
            }
        })
        .collect()
}

fn operation_details(operation: &Operation) -> Value {
    let mut details = Map::new();

    match &operation.body {
        OperationBody::CreateAccount {
            destination,
            starting_balance,
        } => {
            details.insert("destination".into(), json!(destination.address()));
            details.insert("starting_balance".into(), json!(starting_balance));
        }
        OperationBody::Payment {
            destination,
            asset,
            amount,
        } => {
            details.insert("destination".into(), json!(destination.address()));
            details.insert("asset".into(), asset_json(asset));
            details.insert("amount".into(), json!(amount));
        }
        OperationBody::PathPaymentStrictReceive {
            send_asset,
            send_max,
            destination,
            dest_asset,
            dest_amount,
            path,
        } => {
            details.insert("send_asset".into(), asset_json(send_asset));
            details.insert("send_max".into(), json!(send_max));
            details.insert("destination".into(), json!(destination.address()));
            details.insert("dest_asset".into(), asset_json(dest_asset));
            details.insert("dest_amount".into(), json!(dest_amount));
            details.insert("path".into(), assets_json(path));
        }
        OperationBody::PathPaymentStrictSend {
            send_asset,
            send_amount,
            destination,
            dest_asset,
            dest_min,
            path,
        } => {
            details.insert("send_asset".into(), asset_json(send_asset));
            details.insert("send_amount".into(), json!(send_amount));
            details.insert("destination".into(), json!(destination.address()));
            details.insert("dest_asset".into(), asset_json(dest_asset));
            details.insert("dest_min".into(), json!(dest_min));
            details.insert("path".into(), assets_json(path));
        }
        OperationBody::ManageSellOffer {
            selling,
            buying,
            amount,
            price,
            offer_id,
        } => {
            details.insert("selling".into(), asset_json(selling));
            details.insert("buying".into(), asset_json(buying));
            details.insert("amount".into(), json!(amount));
            details.insert("price".into(), price_json(price));
            details.insert("offer_id".into(), json!(offer_id));
        }
        OperationBody::ManageBuyOffer {
            selling,
            buying,
            buy_amount,
            price,
            offer_id,
        } => {
            details.insert("selling".into(), asset_json(selling));
            details.insert("buying".into(), asset_json(buying));
            details.insert("buy_amount".into(), json!(buy_amount));
            details.insert("price".into(), price_json(price));
            details.insert("offer_id".into(), json!(offer_id));
        }
        OperationBody::CreatePassiveSellOffer {
            selling,
            buying,
            amount,
            price,
        } => {
            details.insert("selling".into(), asset_json(selling));
            details.insert("buying".into(), asset_json(buying));
            details.insert("amount".into(), json!(amount));
            details.insert("price".into(), price_json(price));
        }
        OperationBody::SetOptions {
            inflation_dest,
            clear_flags,
            set_flags,
            master_weight,
            low_threshold,
            med_threshold,
            high_threshold,
            home_domain,
            signer,
        } => {
            if let Some(dest) = inflation_dest {
                details.insert("inflation_dest".into(), json!(dest.address()));
            }
            if let Some(flags) = clear_flags {
                details.insert("clear_flags".into(), json!(flags));
            }
            if let Some(flags) = set_flags {
                details.insert("set_flags".into(), json!(flags));
            }
            if let Some(weight) = master_weight {
                details.insert("master_weight".into(), json!(weight));
            }
            if let Some(threshold) = low_threshold {
                details.insert("low_threshold".into(), json!(threshold));
            }
            if let Some(threshold) = med_threshold {
                details.insert("med_threshold".into(), json!(threshold));
            }
            if let Some(threshold) = high_threshold {
                details.insert("high_threshold".into(), json!(threshold));
            }
            if let Some(domain) = home_domain {
                details.insert("home_domain".into(), json!(domain));
            }
            if let Some(signer) = signer {
                details.insert("signer".into(), signer_json(signer));
            }
        }
        OperationBody::ChangeTrust { line, limit } => {
            details.insert("line".into(), change_trust_asset_json(line));
            details.insert("limit".into(), json!(limit));
        }
        OperationBody::AllowTrust {
            trustor,
            asset_code,
            authorize,
        } => {
            details.insert("trustor".into(), json!(trustor.address()));
            details.insert("asset".into(), json!(asset_code));
            details.insert("authorize".into(), json!(authorize));
        }
        OperationBody::AccountMerge { destination } => {
            details.insert("destination".into(), json!(destination.address()));
        }
        OperationBody::Inflation | OperationBody::EndSponsoringFutureReserves => {}
        OperationBody::ManageData {
            data_name,
            data_value,
        } => {
            details.insert("data_name".into(), json!(data_name));
            if let Some(value) = data_value {
                details.insert("data_value".into(), json!(BASE64.encode(value)));
            }
        }
        OperationBody::BumpSequence { bump_to } => {
            details.insert("bump_to".into(), json!(bump_to));
        }
        OperationBody::CreateClaimableBalance {
            asset,
            amount,
            claimants,
        } => {
            details.insert("asset".into(), asset_json(asset));
            details.insert("amount".into(), json!(amount));
            details.insert("claimants".into(), claimants_json(claimants));
        }
        OperationBody::ClaimClaimableBalance { balance_id } => {
            details.insert("balance_id".into(), json!(balance_id.to_hex()));
        }
        OperationBody::BeginSponsoringFutureReserves { sponsored_id } => {
            details.insert("sponsored_id".into(), json!(sponsored_id.address()));
        }
        OperationBody::RevokeSponsorship(revoke) => {
            let kind = match revoke {
                RevokeSponsorship::LedgerEntry(_) => "ledger_entry",
                RevokeSponsorship::Signer { .. } => "signer",
            };
            details.insert("type".into(), json!(kind));
        }
        OperationBody::Clawback {
            asset,
            from,
            amount,
        } => {
            details.insert("asset".into(), asset_json(asset));
            details.insert("from".into(), json!(from.address()));
            details.insert("amount".into(), json!(amount));
        }
        OperationBody::ClawbackClaimableBalance { balance_id } => {
            details.insert("balance_id".into(), json!(balance_id.to_hex()));
        }
        OperationBody::SetTrustLineFlags {
            trustor,
            asset,
            clear_flags,
            set_flags,
        } => {
            details.insert("trustor".into(), json!(trustor.address()));
            details.insert("asset".into(), asset_json(asset));
            details.insert("clear_flags".into(), json!(clear_flags));
            details.insert("set_flags".into(), json!(set_flags));
        }
        OperationBody::LiquidityPoolDeposit {
            pool_id,
            max_amount_a,
            max_amount_b,
            min_price,
            max_price,
        } => {
            details.insert("liquidity_pool_id".into(), json!(const_hex::encode(pool_id)));
            details.insert("max_amount_a".into(), json!(max_amount_a));
            details.insert("max_amount_b".into(), json!(max_amount_b));
            details.insert("min_price".into(), price_json(min_price));
            details.insert("max_price".into(), price_json(max_price));
        }
        OperationBody::LiquidityPoolWithdraw {
            pool_id,
            amount,
            min_amount_a,
            min_amount_b,
        } => {
            details.insert("liquidity_pool_id".into(), json!(const_hex::encode(pool_id)));
            details.insert("amount".into(), json!(amount));
            details.insert("min_amount_a".into(), json!(min_amount_a));
            details.insert("min_amount_b".into(), json!(min_amount_b));
        }
        OperationBody::InvokeHostFunction { host_function } => {
            details.insert("host_function".into(), json!(host_function.type_name()));
        }
        OperationBody::ExtendFootprintTtl { extend_to } => {
            details.insert("extend_to".into(), json!(extend_to));
        }
        OperationBody::RestoreFootprint => {}
    }

    Value::Object(details)
}

fn asset_json(asset: &Asset) -> Value {
    let mut map = Map::new();
    map.insert("type".into(), json!(asset_type_name(asset)));
    map.insert("code".into(), json!(asset.code()));
    if let Some(issuer) = asset.issuer() {
        map.insert("issuer".into(), json!(issuer));
    }
    Value::Object(map)
}

fn asset_type_name(asset: &Asset) -> &'static str {
    match asset {
        Asset::Native => "native",
        Asset::CreditAlphanum4 { .. } => "credit_alphanum4",
        Asset::CreditAlphanum12 { .. } => "credit_alphanum12",
    }
}

fn assets_json(assets: &[Asset]) -> Value {
    Value::Array(assets.iter().map(asset_json).collect())
}

fn change_trust_asset_json(line: &ChangeTrustAsset) -> Value {
    match line {
        ChangeTrustAsset::Asset(asset) => asset_json(asset),
        ChangeTrustAsset::PoolShare { .. } => json!({"type": "pool_share"}),
    }
}

fn price_json(price: &indexer_common::domain::xdr::Price) -> Value {
    json!({"n": price.n, "d": price.d})
}

fn signer_json(signer: &Signer) -> Value {
    json!({
        "key": signer.key.address(),
        "weight": signer.weight,
    })
}

fn claimants_json(claimants: &[Claimant]) -> Value {
    Value::Array(
        claimants
            .iter()
            .map(|claimant| {
                json!({
                    "destination": claimant.destination.address(),
                    "predicate": predicate_json(&claimant.predicate),
                })
            })
            .collect(),
    )
}

fn predicate_json(predicate: &ClaimPredicate) -> Value {
    match predicate {
        ClaimPredicate::Unconditional => json!({"unconditional": true}),
        ClaimPredicate::And(inner) => {
            json!({"and": inner.iter().map(predicate_json).collect::<Vec<_>>()})
        }
        ClaimPredicate::Or(inner) => {
            json!({"or": inner.iter().map(predicate_json).collect::<Vec<_>>()})
        }
        ClaimPredicate::Not(inner) => {
            json!({"not": inner.as_ref().map(|predicate| predicate_json(predicate))})
        }
        ClaimPredicate::BeforeAbsoluteTime(time) => json!({"abs_before": time}),
        ClaimPredicate::BeforeRelativeTime(time) => json!({"rel_before": time}),
    }
}

/// Extract WASM blobs uploaded by the envelope's host-function operations.
pub fn extract_contract_code(
    tx_hash: &str,
    ledger: u32,
    ledger_close_time: i64,
    envelope: &TransactionEnvelope,
) -> Vec<ContractCodeRecord> {
    envelope
        .operations()
        .iter()
        .filter_map(|operation| match &operation.body {
            OperationBody::InvokeHostFunction {
                host_function: HostFunction::UploadWasm(wasm),
            } => Some(ContractCodeRecord {
                hash: const_hex::encode(sha256(wasm)),
                wasm: wasm.clone(),
                deployed_at: ledger_close_time,
                ledger,
                tx_hash: tx_hash.to_string(),
                size_bytes: wasm.len() as i64,
            }),
            _ => None,
        })
        .collect()
}

/// Extract contract-storage records from base64-encoded transaction metadata.
///
/// This is the only path that produces contract-storage records in live mode: created, updated
/// and restored changes yield the new entry; `state` pre-images and removals are ignored.
pub fn extract_contract_data(meta_xdr: &str) -> Result<Vec<ContractDataEntryRecord>, ParseError> {
    let bytes = decode_base64(meta_xdr)?;
    let meta = TransactionMeta::from_bytes(&bytes)?;

    let records = meta
        .changes()
        .filter_map(|change| change.entry())
        .filter_map(|entry| match &entry.data {
            LedgerEntryData::ContractData(data) => contract_data_record(data, 0),
            _ => None,
        })
        .collect();

    Ok(records)
}

fn contract_data_record(
    data: &XdrContractDataEntry,
    expiration_ledger_seq: u32,
) -> Option<ContractDataEntryRecord> {
    // Account-owned cells carry no contract identity and are not indexed.
    let contract_id = data.contract.contract_id()?;

    Some(ContractDataEntryRecord {
        key_hash: const_hex::encode(sha256(&data.ledger_key().to_bytes())),
        contract_id: indexer_common::domain::strkey::encode_contract(contract_id),
        key: data.key.to_json(),
        key_xdr: BASE64.encode(&data.key_bytes),
        val: data.val.to_json(),
        val_xdr: BASE64.encode(&data.val_bytes),
        durability: data.durability.as_str().to_string(),
        expiration_ledger_seq,
        flags: 0,
    })
}

/// Parse one base64-encoded ledger entry into its domain record.
///
/// Entries without a projection (contract code, TTL) yield `None`.
pub fn parse_ledger_entry(item: &LedgerEntryItem) -> Result<Option<LedgerEntryRecord>, ParseError> {
    let bytes = decode_base64(&item.xdr)?;
    let entry = LedgerEntry::from_bytes(&bytes)?;
    let last_modified = entry.last_modified_ledger_seq;
    let sponsoring_id = entry.sponsoring_id.map(|sponsor| sponsor.address());

    let record = match &entry.data {
        LedgerEntryData::ContractData(data) => contract_data_record(
            data,
            item.live_until_ledger_seq,
        )
        .map(LedgerEntryRecord::ContractData),

        LedgerEntryData::Account(account) => Some(LedgerEntryRecord::Account(AccountEntryRecord {
            account_id: account.account_id.address(),
            balance: account.balance,
            seq_num: account.seq_num,
            num_sub_entries: account.num_sub_entries,
            inflation_dest: account.inflation_dest.map(|dest| dest.address()),
            flags: account.flags,
            home_domain: account.home_domain.clone(),
            thresholds: account.thresholds.to_vec(),
            signers: Value::Array(account.signers.iter().map(signer_json).collect()),
            last_modified_ledger_seq: last_modified,
            sponsoring_id,
        })),

        LedgerEntryData::TrustLine(trust_line) => {
            use indexer_common::domain::xdr::TrustLineAsset;

            let (asset_key, asset_code, asset_issuer, pool_id) = match &trust_line.asset {
                TrustLineAsset::Asset(Asset::Native) => {
                    ("native".to_string(), None, None, None)
                }
                TrustLineAsset::Asset(asset) => {
                    let code = asset.code();
                    let issuer = asset.issuer().unwrap_or_default();
                    (format!("{code}:{issuer}"), Some(code), Some(issuer), None)
                }
                TrustLineAsset::PoolShare(pool_id) => {
                    let hex = const_hex::encode(pool_id);
                    (format!("pool:{hex}"), None, None, Some(hex))
                }
            };

            Some(LedgerEntryRecord::TrustLine(TrustLineEntryRecord {
                account_id: trust_line.account_id.address(),
                asset_key,
                asset_type: trust_line.asset.type_tag(),
                asset_code,
                asset_issuer,
                liquidity_pool_id: pool_id,
                balance: trust_line.balance,
                limit: trust_line.limit,
                flags: trust_line.flags,
                last_modified_ledger_seq: last_modified,
                sponsoring_id,
            }))
        }

        LedgerEntryData::Offer(offer) => Some(LedgerEntryRecord::Offer(OfferEntryRecord {
            offer_id: offer.offer_id,
            seller_id: offer.seller_id.address(),
            selling_asset_type: offer.selling.type_tag(),
            selling_asset_code: non_native_code(&offer.selling),
            selling_asset_issuer: offer.selling.issuer(),
            buying_asset_type: offer.buying.type_tag(),
            buying_asset_code: non_native_code(&offer.buying),
            buying_asset_issuer: offer.buying.issuer(),
            amount: offer.amount,
            price: offer.price.as_rational_string(),
            flags: offer.flags,
            last_modified_ledger_seq: last_modified,
            sponsoring_id,
        })),

        LedgerEntryData::Data(data) => Some(LedgerEntryRecord::Data(AccountDataEntryRecord {
            account_id: data.account_id.address(),
            data_name: data.data_name.clone(),
            data_value: data.data_value.clone(),
            last_modified_ledger_seq: last_modified,
            sponsoring_id,
        })),

        LedgerEntryData::ClaimableBalance(balance) => Some(
            LedgerEntryRecord::ClaimableBalance(ClaimableBalanceEntryRecord {
                balance_id: balance.balance_id.to_hex(),
                claimants: claimants_json(&balance.claimants),
                asset_type: balance.asset.type_tag(),
                asset_code: non_native_code(&balance.asset),
                asset_issuer: balance.asset.issuer(),
                amount: balance.amount,
                flags: balance.flags,
                last_modified_ledger_seq: last_modified,
                sponsoring_id,
            }),
        ),

        LedgerEntryData::LiquidityPool(pool) => Some(LedgerEntryRecord::LiquidityPool(
            LiquidityPoolEntryRecord {
                liquidity_pool_id: const_hex::encode(pool.pool_id),
                fee: pool.fee,
                reserve_a: pool.reserve_a,
                reserve_b: pool.reserve_b,
                total_pool_shares: pool.total_pool_shares,
                pool_shares_trust_line_count: pool.pool_shares_trust_line_count,
                asset_a_type: pool.asset_a.type_tag(),
                asset_a_code: non_native_code(&pool.asset_a),
                asset_a_issuer: pool.asset_a.issuer(),
                asset_b_type: pool.asset_b.type_tag(),
                asset_b_code: non_native_code(&pool.asset_b),
                asset_b_issuer: pool.asset_b.issuer(),
                last_modified_ledger_seq: last_modified,
                sponsoring_id,
            },
        )),

        LedgerEntryData::ContractCode(_) | LedgerEntryData::Ttl(_) => None,
    };

    Ok(record)
}

fn non_native_code(asset: &Asset) -> Option<String> {
    match asset {
        Asset::Native => None,
        _ => Some(asset.code()),
    }
}

/// Claimable-balance ids referenced by claim operations in the envelope.
pub fn extract_claimable_balance_ids(envelope: &TransactionEnvelope) -> Vec<String> {
    envelope
        .operations()
        .iter()
        .filter_map(|operation| match &operation.body {
            OperationBody::ClaimClaimableBalance { balance_id } => Some(balance_id.to_hex()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::domain::{
        node::{EventItem, TransactionInfo},
        parser::{
            compute_transaction_hash, decode_envelope, extract_contract_code,
            extract_contract_data, parse_event, parse_operations, parse_transaction,
        },
    };
    use assert_matches::assert_matches;
    use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
    use indexer_common::domain::{
        NetworkId,
        scval::{ScAddress, ScVal},
        sha256, strkey,
        xdr::Writer,
    };
    use serde_json::json;

    const PASSPHRASE: &str = "Test SDF Network ; September 2015";

    fn payment_body() -> Vec<u8> {
        let mut w = Writer::new();
        w.put_u32(1); // PAYMENT
        w.put_u32(0);
        w.put_fixed(&[2; 32]);
        w.put_u32(0); // native
        w.put_i64(7_500);
        w.into_bytes()
    }

    fn upload_wasm_body(wasm: &[u8]) -> Vec<u8> {
        let mut w = Writer::new();
        w.put_u32(24);
        w.put_u32(2); // UPLOAD_CONTRACT_WASM
        w.put_var_bytes(wasm);
        w.put_u32(0);
        w.into_bytes()
    }

    fn v1_envelope_b64(op_bodies: &[Vec<u8>]) -> String {
        let mut w = Writer::new();
        w.put_u32(2); // ENVELOPE_TYPE_TX
        w.put_u32(0);
        w.put_fixed(&[1; 32]);
        w.put_u32(100);
        w.put_i64(42);
        w.put_u32(0); // PRECOND_NONE
        w.put_u32(1); // MEMO_TEXT
        w.put_string("hello");
        w.put_u32(op_bodies.len() as u32);
        for body in op_bodies {
            w.put_u32(0); // no per-operation source
            w.put_fixed(body);
        }
        w.put_u32(0); // ext
        w.put_u32(0); // signatures
        BASE64.encode(w.into_bytes())
    }

    #[test]
    fn test_parse_event_decodes_topics_and_value() {
        let from = strkey::encode_account(&[1; 32]);
        let item = EventItem {
            id: "0000000101-0000000001".to_string(),
            event_type: "contract".to_string(),
            ledger: 101,
            ledger_closed_at: "2025-01-01T00:00:00Z".to_string(),
            contract_id: strkey::encode_contract(&[5; 32]),
            paging_token: "0000000101-0000000001".to_string(),
            topic: vec![
                BASE64.encode(ScVal::Symbol("transfer".to_string()).to_bytes()),
                BASE64.encode(
                    ScVal::Address(ScAddress::Account(
                        indexer_common::domain::xdr::AccountId([1; 32]),
                    ))
                    .to_bytes(),
                ),
            ],
            value: BASE64.encode(ScVal::I128(1_000_000).to_bytes()),
            in_successful_contract_call: true,
            tx_hash: "abc".to_string(),
        };

        let event = parse_event(&item);

        assert_eq!(event.tx_index, 1);
        assert_eq!(event.topic, json!(["transfer", from]));
        assert_eq!(event.value, json!("1000000"));
        assert_eq!(event.last_modified_ledger_seq, 101);
    }

    #[test]
    fn test_parse_event_keeps_undecodable_artifacts_raw() {
        let item = EventItem {
            id: "x".to_string(),
            topic: vec!["not-base64!!".to_string()],
            value: "@@@".to_string(),
            ..Default::default()
        };

        let event = parse_event(&item);
        assert_eq!(event.topic, json!(["not-base64!!"]));
        assert_eq!(event.value, json!("@@@"));
        assert_eq!(event.tx_index, 0);
    }

    #[test]
    fn test_parse_transaction() {
        let info = TransactionInfo {
            hash: String::new(),
            status: "SUCCESS".to_string(),
            ledger: 200,
            application_order: 3,
            ledger_close_time: 1_700_000_000,
            envelope_xdr: v1_envelope_b64(&[payment_body()]),
            result_xdr: {
                let mut w = Writer::new();
                w.put_i64(110);
                w.put_u32(0);
                BASE64.encode(w.into_bytes())
            },
            result_meta_xdr: String::new(),
        };

        let envelope = decode_envelope(&info.envelope_xdr).unwrap();
        let tx = parse_transaction(&info, &envelope, "deadbeef");

        assert_eq!(tx.id, "deadbeef");
        assert_eq!(tx.status, "SUCCESS");
        assert_eq!(tx.ledger, Some(200));
        assert_eq!(tx.fee, Some(100));
        assert_eq!(tx.fee_charged, Some(110));
        assert_eq!(tx.sequence, Some(42));
        assert_eq!(tx.fee_bump, Some(false));
        assert_eq!(tx.source_account, Some(strkey::encode_account(&[1; 32])));
        assert_eq!(tx.memo.as_ref().unwrap().value, "hello");
        assert!(tx.preconditions.is_none());
        assert!(tx.signatures.is_none());
    }

    #[test]
    fn test_parse_operations_details() {
        let envelope = decode_envelope(&v1_envelope_b64(&[payment_body()])).unwrap();
        let operations = parse_operations("cafe", &envelope);

        assert_eq!(operations.len(), 1);
        let operation = &operations[0];
        assert_eq!(operation.id, "cafe-0");
        assert_eq!(operation.operation_index, 0);
        assert_eq!(operation.operation_type, "OperationTypePayment");
        assert_eq!(operation.source_account, strkey::encode_account(&[1; 32]));
        assert_eq!(operation.details["amount"], json!(7_500));
        assert_eq!(operation.details["asset"]["code"], json!("XLM"));
        assert_eq!(
            operation.details["destination"],
            json!(strkey::encode_account(&[2; 32]))
        );
    }

    #[test]
    fn test_extract_contract_code() {
        let wasm = vec![0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00];
        let envelope = decode_envelope(&v1_envelope_b64(&[upload_wasm_body(&wasm)])).unwrap();

        let codes = extract_contract_code("cafe", 300, 1_700_000_000, &envelope);

        assert_eq!(codes.len(), 1);
        assert_eq!(codes[0].hash, const_hex::encode(sha256(&wasm)));
        assert_eq!(codes[0].wasm, wasm);
        assert_eq!(codes[0].size_bytes, 8);
        assert_eq!(codes[0].ledger, 300);
    }

    #[test]
    fn test_compute_transaction_hash_is_deterministic() {
        let envelope = v1_envelope_b64(&[payment_body()]);

        let a = compute_transaction_hash(&envelope, NetworkId::from_passphrase(PASSPHRASE));
        let b = compute_transaction_hash(&envelope, NetworkId::from_passphrase(PASSPHRASE));
        let c = compute_transaction_hash(
            &envelope,
            NetworkId::from_passphrase("Public Global Stellar Network ; September 2015"),
        );

        assert_eq!(a.as_ref().unwrap(), b.as_ref().unwrap());
        assert_ne!(a.unwrap(), c.unwrap());
    }

    #[test]
    fn test_extract_contract_data_from_meta() {
        let mut w = Writer::new();
        w.put_u32(3); // meta v3
        w.put_u32(0); // ext
        w.put_u32(0); // txChangesBefore
        w.put_u32(0); // operations
        w.put_u32(1); // txChangesAfter
        w.put_u32(0); // CREATED
        w.put_u32(7); // lastModifiedLedgerSeq
        w.put_u32(6); // CONTRACT_DATA
        w.put_u32(0); // ext
        ScAddress::Contract([4; 32]).encode(&mut w);
        ScVal::Symbol("Counter".to_string()).encode(&mut w);
        w.put_u32(1); // persistent
        ScVal::U32(9).encode(&mut w);
        w.put_u32(0); // entry ext
        w.put_u32(0); // sorobanMeta absent

        let records = extract_contract_data(&BASE64.encode(w.into_bytes())).unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.contract_id, strkey::encode_contract(&[4; 32]));
        assert_eq!(record.key, json!("Counter"));
        assert_eq!(record.val, json!(9));
        assert_eq!(record.durability, "persistent");
        assert_eq!(record.key_hash.len(), 64);
        assert_eq!(
            BASE64.decode(&record.key_xdr).unwrap(),
            ScVal::Symbol("Counter".to_string()).to_bytes()
        );
    }

    #[test]
    fn test_malformed_envelope_is_an_error() {
        use crate::domain::parser::ParseError;

        assert_matches!(decode_envelope("zzz not base64"), Err(ParseError::Base64(_)));
        assert_matches!(
            decode_envelope(&BASE64.encode([1, 2, 3])),
            Err(ParseError::Xdr(_))
        );
    }
}
