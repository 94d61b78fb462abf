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

//! Token projections, derived by pattern-matching on already-decoded artifacts.
//!
//! Derivation never fails a tick: anything that does not match a known shape simply yields no
//! projection.

use crate::domain::{Event, TokenBalanceRecord, TokenMetadataRecord, TokenOperationRecord};
use serde_json::Value;

/// The contract-instance storage key holding token metadata pairs.
const METADATA_KEY: &str = "METADATA";

/// The contract-instance storage key holding the admin address.
const ADMIN_KEY: &str = "Admin";

/// Try to derive a token operation from a decoded event.
///
/// The first topic names the operation; arity and value shape per type are fixed. A mismatch
/// yields `None`.
pub fn derive_token_operation(event: &Event) -> Option<TokenOperationRecord> {
    let topics = event.topic.as_array()?;
    let topics = topics.iter().map(value_string).collect::<Vec<_>>();
    let op_type = topics.first()?.as_str();

    let record = TokenOperationRecord {
        id: event.id.clone(),
        op_type: op_type.to_string(),
        tx_index: event.tx_index,
        ledger: event.ledger,
        ledger_closed_at: event.ledger_closed_at.clone(),
        contract_id: event.contract_id.clone(),
        ..Default::default()
    };

    match op_type {
        "transfer" | "mint" => {
            if topics.len() < 3 {
                return None;
            }
            Some(TokenOperationRecord {
                from: topics[1].clone(),
                to: Some(topics[2].clone()),
                amount: Some(amount_string(&event.value)),
                ..record
            })
        }

        "burn" => {
            if topics.len() < 2 {
                return None;
            }
            Some(TokenOperationRecord {
                from: topics[1].clone(),
                amount: Some(amount_string(&event.value)),
                ..record
            })
        }

        // Topics are [tag, victim, admin].
        "clawback" => {
            if topics.len() < 3 {
                return None;
            }
            Some(TokenOperationRecord {
                from: topics[2].clone(),
                to: Some(topics[1].clone()),
                amount: Some(amount_string(&event.value)),
                ..record
            })
        }

        // Value is [amount, expiration_ledger].
        "approve" => {
            if topics.len() < 3 {
                return None;
            }
            let value = event.value.as_array()?;
            if value.len() < 2 {
                return None;
            }
            Some(TokenOperationRecord {
                from: topics[1].clone(),
                to: Some(topics[2].clone()),
                amount: Some(amount_string(&value[0])),
                expiration_ledger: Some(value_i64(&value[1]) as u32),
                ..record
            })
        }

        "set_authorized" => {
            if topics.len() < 3 {
                return None;
            }
            Some(TokenOperationRecord {
                from: topics[1].clone(),
                to: Some(topics[2].clone()),
                authorized: Some(event.value.as_bool().unwrap_or_default()),
                ..record
            })
        }

        "set_admin" => {
            if topics.len() < 2 {
                return None;
            }
            Some(TokenOperationRecord {
                from: topics[1].clone(),
                to: Some(value_string(&event.value)),
                ..record
            })
        }

        _ => None,
    }
}

/// Try to derive token metadata from a contract-storage cell.
///
/// Recognized when the key is the contract-instance marker (`{"type":
/// "LedgerKeyContractInstance"}`, or the legacy string `"ScvLedgerKeyContractInstance"`) and the
/// instance storage carries `METADATA`/`Admin` entries. Emitted only when a name or symbol was
/// found.
pub fn derive_token_metadata(
    contract_id: &str,
    key: &Value,
    val: &Value,
) -> Option<TokenMetadataRecord> {
    if !is_contract_instance_key(key) {
        return None;
    }

    let storage = val.get("storage")?.as_array()?;

    let mut metadata = TokenMetadataRecord {
        contract_id: contract_id.to_string(),
        ..Default::default()
    };

    for item in storage {
        let item_key = item.get("key").map(value_string).unwrap_or_default();
        let Some(item_value) = item.get("value") else {
            continue;
        };

        if item_key == METADATA_KEY {
            let Some(pairs) = item_value.as_array() else {
                continue;
            };
            for pair in pairs {
                let pair_key = pair.get("key").map(value_string).unwrap_or_default();
                let Some(pair_value) = pair.get("value") else {
                    continue;
                };

                match pair_key.as_str() {
                    "name" => metadata.name = value_string(pair_value),
                    "symbol" => metadata.symbol = value_string(pair_value),
                    "decimal" => metadata.decimal = value_i64(pair_value) as u32,
                    _ => {}
                }
            }
        } else if item_key == ADMIN_KEY {
            metadata.admin_address = value_string(item_value);
        }
    }

    (!metadata.name.is_empty() || !metadata.symbol.is_empty()).then_some(metadata)
}

fn is_contract_instance_key(key: &Value) -> bool {
    match key {
        Value::String(key) => {
            key == "ScvLedgerKeyContractInstance" || key == "\"ScvLedgerKeyContractInstance\""
        }
        Value::Object(map) => map
            .get("type")
            .and_then(Value::as_str)
            .is_some_and(|key_type| key_type == "LedgerKeyContractInstance"),
        _ => false,
    }
}

/// Try to derive a token balance from a contract-storage cell.
///
/// Recognized when the key is the pair `["Balance", <address>]`; the balance is the value
/// itself when scalar, or its `amount` field when structured.
pub fn derive_token_balance(
    contract_id: &str,
    key: &Value,
    val: &Value,
) -> Option<TokenBalanceRecord> {
    let key = key.as_array()?;
    if key.len() != 2 || key[0].as_str() != Some("Balance") {
        return None;
    }
    let address = key[1].as_str()?;

    let balance = match val {
        Value::String(balance) => Some(balance.clone()),
        Value::Number(balance) => Some(balance.to_string()),
        Value::Array(pairs) => pairs.iter().find_map(|pair| {
            (pair.get("key").and_then(Value::as_str) == Some("amount"))
                .then(|| pair.get("value").map(value_string))
                .flatten()
        }),
        Value::Object(map) => map.get("amount").map(value_string),
        _ => None,
    }?;

    if balance.is_empty() {
        return None;
    }

    Some(TokenBalanceRecord {
        contract_id: contract_id.to_string(),
        address: address.to_string(),
        balance,
    })
}

fn value_string(value: &Value) -> String {
    match value {
        Value::String(value) => value.clone(),
        other => other.to_string(),
    }
}

// 128-bit amounts arrive as decimal strings; anything unparsable counts as zero.
fn amount_string(value: &Value) -> String {
    value_string(value)
        .parse::<i128>()
        .map(|amount| amount.to_string())
        .unwrap_or_else(|_| "0".to_string())
}

fn value_i64(value: &Value) -> i64 {
    match value {
        Value::Number(value) => value.as_i64().unwrap_or_default(),
        Value::String(value) => value.parse().unwrap_or_default(),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::{
        Event,
        token::{derive_token_balance, derive_token_metadata, derive_token_operation},
    };
    use serde_json::{Value, json};

    fn event(topic: Value, value: Value) -> Event {
        Event {
            id: "0000000101-0000000001".to_string(),
            tx_index: 1,
            event_type: "contract".to_string(),
            ledger: 101,
            ledger_closed_at: "2025-01-01T00:00:00Z".to_string(),
            contract_id: "CCONTRACT".to_string(),
            paging_token: String::new(),
            topic,
            value,
            in_successful_contract_call: true,
            last_modified_ledger_seq: 101,
        }
    }

    #[test]
    fn test_transfer() {
        let event = event(json!(["transfer", "GFROM", "GTO"]), json!("1000000"));
        let op = derive_token_operation(&event).unwrap();

        assert_eq!(op.id, "0000000101-0000000001");
        assert_eq!(op.op_type, "transfer");
        assert_eq!(op.from, "GFROM");
        assert_eq!(op.to.as_deref(), Some("GTO"));
        assert_eq!(op.amount.as_deref(), Some("1000000"));
        assert_eq!(op.ledger, 101);
    }

    #[test]
    fn test_mint_maps_admin_to_from() {
        let event = event(json!(["mint", "GADMIN", "GTO"]), json!("5"));
        let op = derive_token_operation(&event).unwrap();

        assert_eq!(op.from, "GADMIN");
        assert_eq!(op.to.as_deref(), Some("GTO"));
    }

    #[test]
    fn test_burn() {
        let event = event(json!(["burn", "GFROM"]), json!("42"));
        let op = derive_token_operation(&event).unwrap();

        assert_eq!(op.from, "GFROM");
        assert_eq!(op.to, None);
        assert_eq!(op.amount.as_deref(), Some("42"));
    }

    #[test]
    fn test_clawback_swaps_victim_and_admin() {
        let event = event(json!(["clawback", "GVICTIM", "GADMIN"]), json!("9"));
        let op = derive_token_operation(&event).unwrap();

        assert_eq!(op.from, "GADMIN");
        assert_eq!(op.to.as_deref(), Some("GVICTIM"));
    }

    #[test]
    fn test_approve_with_expiration() {
        let event = event(json!(["approve", "GFROM", "GSPENDER"]), json!(["777", 12345]));
        let op = derive_token_operation(&event).unwrap();

        assert_eq!(op.from, "GFROM");
        assert_eq!(op.to.as_deref(), Some("GSPENDER"));
        assert_eq!(op.amount.as_deref(), Some("777"));
        assert_eq!(op.expiration_ledger, Some(12345));
    }

    #[test]
    fn test_set_authorized() {
        let event = event(json!(["set_authorized", "GADMIN", "GTARGET"]), json!(true));
        let op = derive_token_operation(&event).unwrap();

        assert_eq!(op.from, "GADMIN");
        assert_eq!(op.to.as_deref(), Some("GTARGET"));
        assert_eq!(op.authorized, Some(true));
    }

    #[test]
    fn test_set_admin() {
        let event = event(json!(["set_admin", "GOLD"]), json!("GNEW"));
        let op = derive_token_operation(&event).unwrap();

        assert_eq!(op.from, "GOLD");
        assert_eq!(op.to.as_deref(), Some("GNEW"));
    }

    #[test]
    fn test_arity_mismatch_yields_none() {
        assert!(derive_token_operation(&event(json!(["transfer", "GFROM"]), json!("1"))).is_none());
        assert!(derive_token_operation(&event(json!(["burn"]), json!("1"))).is_none());
        assert!(
            derive_token_operation(&event(json!(["approve", "GFROM", "GTO"]), json!(["1"])))
                .is_none()
        );
        assert!(derive_token_operation(&event(json!([]), json!("1"))).is_none());
    }

    #[test]
    fn test_unknown_tag_yields_none() {
        assert!(derive_token_operation(&event(json!(["swap", "a", "b"]), json!("1"))).is_none());
    }

    #[test]
    fn test_huge_amount_stays_decimal_string() {
        let event = event(
            json!(["transfer", "GFROM", "GTO"]),
            json!("170141183460469231731687303715884105727"),
        );
        let op = derive_token_operation(&event).unwrap();
        assert_eq!(
            op.amount.as_deref(),
            Some("170141183460469231731687303715884105727")
        );
    }

    #[test]
    fn test_metadata_from_instance() {
        let key = json!({"type": "LedgerKeyContractInstance"});
        let val = json!({
            "executable": {"type": "Wasm", "wasmHash": "aa"},
            "storage": [
                {"key": "METADATA", "value": [
                    {"key": "name", "value": "T"},
                    {"key": "symbol", "value": "TKN"},
                    {"key": "decimal", "value": 7},
                ]},
                {"key": "Admin", "value": "GADMIN"},
            ],
        });

        let metadata = derive_token_metadata("CCONTRACT", &key, &val).unwrap();

        assert_eq!(metadata.contract_id, "CCONTRACT");
        assert_eq!(metadata.name, "T");
        assert_eq!(metadata.symbol, "TKN");
        assert_eq!(metadata.decimal, 7);
        assert_eq!(metadata.admin_address, "GADMIN");
    }

    #[test]
    fn test_metadata_accepts_legacy_string_key() {
        let val = json!({
            "storage": [
                {"key": "METADATA", "value": [{"key": "symbol", "value": "TKN"}]},
            ],
        });

        let metadata =
            derive_token_metadata("C1", &json!("ScvLedgerKeyContractInstance"), &val).unwrap();
        assert_eq!(metadata.symbol, "TKN");
    }

    #[test]
    fn test_metadata_requires_name_or_symbol() {
        let key = json!({"type": "LedgerKeyContractInstance"});
        let val = json!({
            "storage": [{"key": "Admin", "value": "GADMIN"}],
        });

        assert!(derive_token_metadata("C1", &key, &val).is_none());
    }

    #[test]
    fn test_metadata_requires_instance_key() {
        let val = json!({"storage": []});
        assert!(derive_token_metadata("C1", &json!("Balance"), &val).is_none());
        assert!(derive_token_metadata("C1", &json!(42), &val).is_none());
    }

    #[test]
    fn test_balance_from_scalar() {
        let key = json!(["Balance", "GHOLDER"]);
        let balance = derive_token_balance("C1", &key, &json!("12345")).unwrap();

        assert_eq!(balance.address, "GHOLDER");
        assert_eq!(balance.balance, "12345");
    }

    #[test]
    fn test_balance_from_amount_pairs() {
        let key = json!(["Balance", "GHOLDER"]);
        let val = json!([
            {"key": "amount", "value": "999"},
            {"key": "authorized", "value": true},
        ]);

        let balance = derive_token_balance("C1", &key, &val).unwrap();
        assert_eq!(balance.balance, "999");
    }

    #[test]
    fn test_balance_key_shape_mismatch_yields_none() {
        assert!(derive_token_balance("C1", &json!(["Balance"]), &json!("1")).is_none());
        assert!(derive_token_balance("C1", &json!(["Allowance", "G"]), &json!("1")).is_none());
        assert!(derive_token_balance("C1", &json!("Balance"), &json!("1")).is_none());
        assert!(
            derive_token_balance("C1", &json!(["Balance", "GHOLDER"]), &json!(null)).is_none()
        );
    }
}
