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

//! The chain's self-describing scalar (`ScVal`) and its projection to JSON.
//!
//! The JSON projection is the shape persisted in structured columns and therefore load-bearing:
//! 128-bit integers render as decimal strings, maps as ordered `{key, value}` pair sequences
//! (the wire format preserves insertion order and admits non-string keys), addresses in strkey
//! form, and tags without a useful projection as JSON null so that downstream JSON encoding
//! never sees a foreign stringification.

use crate::domain::{
    strkey,
    xdr::{AccountId, Reader, Writer, XdrError},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde_json::{Value, json};

/// The maximum length of a symbol.
const SYMBOL_LIMIT: u32 = 32;

/// The self-describing scalar value, one variant per wire tag.
#[derive(Debug, Clone, PartialEq)]
pub enum ScVal {
    Bool(bool),
    Void,
    Error(ScError),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    Timepoint(u64),
    Duration(u64),
    U128(u128),
    I128(i128),
    U256([u8; 32]),
    I256([u8; 32]),
    Bytes(Vec<u8>),
    String(String),
    Symbol(String),
    Vec(Vec<ScVal>),
    Map(Vec<ScMapEntry>),
    Address(ScAddress),
    ContractInstance(ScContractInstance),
    LedgerKeyContractInstance,
    LedgerKeyNonce(i64),
}

/// One entry of an ordered map value.
#[derive(Debug, Clone, PartialEq)]
pub struct ScMapEntry {
    pub key: ScVal,
    pub val: ScVal,
}

/// A host error value. Projected to JSON null.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScError {
    pub error_type: u32,
    pub code: i32,
}

/// An address value: an account or a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScAddress {
    Account(AccountId),
    Contract([u8; 32]),
}

impl ScAddress {
    pub fn decode(r: &mut Reader) -> Result<Self, XdrError> {
        match r.read_u32()? {
            0 => Ok(Self::Account(AccountId::decode(r)?)),
            1 => Ok(Self::Contract(r.read_fixed()?)),
            other => Err(XdrError::InvalidDiscriminant {
                kind: "ScAddressType",
                value: other as i64,
            }),
        }
    }

    pub fn encode(&self, w: &mut Writer) {
        match self {
            Self::Account(account) => {
                w.put_u32(0);
                account.encode(w);
            }
            Self::Contract(hash) => {
                w.put_u32(1);
                w.put_fixed(hash);
            }
        }
    }

    /// Canonical strkey form: `G…` for accounts, `C…` for contracts.
    pub fn address(&self) -> String {
        match self {
            Self::Account(account) => account.address(),
            Self::Contract(hash) => strkey::encode_contract(hash),
        }
    }

    /// The contract id hash, when this is a contract address.
    pub fn contract_id(&self) -> Option<&[u8; 32]> {
        match self {
            Self::Account(_) => None,
            Self::Contract(hash) => Some(hash),
        }
    }
}

/// A contract instance value: the executable reference plus instance storage.
#[derive(Debug, Clone, PartialEq)]
pub struct ScContractInstance {
    pub executable: ContractExecutable,
    pub storage: Vec<ScMapEntry>,
}

/// The executable a contract instance points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractExecutable {
    Wasm([u8; 32]),
    StellarAsset,
}

impl ScVal {
    /// Decode one value from the reader.
    pub fn decode(r: &mut Reader) -> Result<Self, XdrError> {
        let val = match r.read_u32()? {
            0 => Self::Bool(r.read_bool()?),
            1 => Self::Void,
            2 => Self::Error(decode_error(r)?),
            3 => Self::U32(r.read_u32()?),
            4 => Self::I32(r.read_i32()?),
            5 => Self::U64(r.read_u64()?),
            6 => Self::I64(r.read_i64()?),
            7 => Self::Timepoint(r.read_u64()?),
            8 => Self::Duration(r.read_u64()?),
            9 => {
                let hi = r.read_u64()?;
                let lo = r.read_u64()?;
                Self::U128(((hi as u128) << 64) | lo as u128)
            }
            10 => {
                let hi = r.read_i64()?;
                let lo = r.read_u64()?;
                Self::I128(((hi as i128) << 64) | lo as i128)
            }
            11 => Self::U256(r.read_fixed()?),
            12 => Self::I256(r.read_fixed()?),
            13 => Self::Bytes(r.read_var_bytes(u32::MAX)?),
            14 => Self::String(r.read_string(u32::MAX)?),
            15 => Self::Symbol(r.read_string(SYMBOL_LIMIT)?),
            16 => {
                let vec = r.read_option(|r| r.read_array(u32::MAX, ScVal::decode))?;
                Self::Vec(vec.unwrap_or_default())
            }
            17 => {
                let map = r.read_option(|r| r.read_array(u32::MAX, decode_map_entry))?;
                Self::Map(map.unwrap_or_default())
            }
            18 => Self::Address(ScAddress::decode(r)?),
            19 => Self::ContractInstance(decode_instance(r)?),
            20 => Self::LedgerKeyContractInstance,
            21 => Self::LedgerKeyNonce(r.read_i64()?),
            other => {
                return Err(XdrError::InvalidDiscriminant {
                    kind: "ScValType",
                    value: other as i64,
                });
            }
        };

        Ok(val)
    }

    /// Decode one value from a standalone buffer, requiring full consumption.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, XdrError> {
        let mut r = Reader::new(bytes);
        let val = Self::decode(&mut r)?;
        r.finish()?;
        Ok(val)
    }

    /// Encode this value onto the writer.
    pub fn encode(&self, w: &mut Writer) {
        match self {
            Self::Bool(value) => {
                w.put_u32(0);
                w.put_bool(*value);
            }
            Self::Void => w.put_u32(1),
            Self::Error(error) => {
                w.put_u32(2);
                w.put_u32(error.error_type);
                w.put_i32(error.code);
            }
            Self::U32(value) => {
                w.put_u32(3);
                w.put_u32(*value);
            }
            Self::I32(value) => {
                w.put_u32(4);
                w.put_i32(*value);
            }
            Self::U64(value) => {
                w.put_u32(5);
                w.put_u64(*value);
            }
            Self::I64(value) => {
                w.put_u32(6);
                w.put_i64(*value);
            }
            Self::Timepoint(value) => {
                w.put_u32(7);
                w.put_u64(*value);
            }
            Self::Duration(value) => {
                w.put_u32(8);
                w.put_u64(*value);
            }
            Self::U128(value) => {
                w.put_u32(9);
                w.put_u64((value >> 64) as u64);
                w.put_u64(*value as u64);
            }
            Self::I128(value) => {
                w.put_u32(10);
                w.put_i64((value >> 64) as i64);
                w.put_u64(*value as u64);
            }
            Self::U256(bytes) => {
                w.put_u32(11);
                w.put_fixed(bytes);
            }
            Self::I256(bytes) => {
                w.put_u32(12);
                w.put_fixed(bytes);
            }
            Self::Bytes(bytes) => {
                w.put_u32(13);
                w.put_var_bytes(bytes);
            }
            Self::String(value) => {
                w.put_u32(14);
                w.put_string(value);
            }
            Self::Symbol(value) => {
                w.put_u32(15);
                w.put_string(value);
            }
            Self::Vec(items) => {
                w.put_u32(16);
                w.put_u32(1);
                w.put_u32(items.len() as u32);
                for item in items {
                    item.encode(w);
                }
            }
            Self::Map(entries) => {
                w.put_u32(17);
                w.put_u32(1);
                w.put_u32(entries.len() as u32);
                for entry in entries {
                    entry.key.encode(w);
                    entry.val.encode(w);
                }
            }
            Self::Address(address) => {
                w.put_u32(18);
                address.encode(w);
            }
            Self::ContractInstance(instance) => {
                w.put_u32(19);
                match instance.executable {
                    ContractExecutable::Wasm(hash) => {
                        w.put_u32(0);
                        w.put_fixed(&hash);
                    }
                    ContractExecutable::StellarAsset => w.put_u32(1),
                }
                w.put_u32(1);
                w.put_u32(instance.storage.len() as u32);
                for entry in &instance.storage {
                    entry.key.encode(w);
                    entry.val.encode(w);
                }
            }
            Self::LedgerKeyContractInstance => w.put_u32(20),
            Self::LedgerKeyNonce(nonce) => {
                w.put_u32(21);
                w.put_i64(*nonce);
            }
        }
    }

    /// Encode this value into a standalone buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        self.encode(&mut w);
        w.into_bytes()
    }

    /// Project this value to its JSON form.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(value) => json!(value),
            Self::Void => Value::Null,
            Self::U32(value) => json!(value),
            Self::I32(value) => json!(value),
            Self::U64(value) => json!(value),
            Self::I64(value) => json!(value),
            Self::U128(value) => json!(value.to_string()),
            Self::I128(value) => json!(value.to_string()),
            Self::Bytes(bytes) => json!(BASE64.encode(bytes)),
            Self::String(value) => json!(value),
            Self::Symbol(value) => json!(value),
            Self::Vec(items) => Value::Array(items.iter().map(ScVal::to_json).collect()),
            Self::Map(entries) => map_to_json(entries),
            Self::Address(address) => json!(address.address()),
            Self::ContractInstance(instance) => {
                let mut executable = serde_json::Map::new();
                match instance.executable {
                    ContractExecutable::Wasm(hash) => {
                        executable.insert("type".to_string(), json!("Wasm"));
                        executable.insert("wasmHash".to_string(), json!(const_hex::encode(hash)));
                    }
                    ContractExecutable::StellarAsset => {
                        executable.insert("type".to_string(), json!("StellarAsset"));
                    }
                }

                json!({
                    "executable": executable,
                    "storage": map_to_json(&instance.storage),
                })
            }
            Self::LedgerKeyContractInstance => json!({"type": "LedgerKeyContractInstance"}),
            // Tags without a useful projection decode to null, never to a stringification.
            Self::Error(_)
            | Self::Timepoint(_)
            | Self::Duration(_)
            | Self::U256(_)
            | Self::I256(_)
            | Self::LedgerKeyNonce(_) => Value::Null,
        }
    }
}

fn decode_error(r: &mut Reader) -> Result<ScError, XdrError> {
    let error_type = r.read_u32()?;
    if error_type > 9 {
        return Err(XdrError::InvalidDiscriminant {
            kind: "ScErrorType",
            value: error_type as i64,
        });
    }

    Ok(ScError {
        error_type,
        code: r.read_i32()?,
    })
}

fn decode_map_entry(r: &mut Reader) -> Result<ScMapEntry, XdrError> {
    Ok(ScMapEntry {
        key: ScVal::decode(r)?,
        val: ScVal::decode(r)?,
    })
}

fn decode_instance(r: &mut Reader) -> Result<ScContractInstance, XdrError> {
    let executable = match r.read_u32()? {
        0 => ContractExecutable::Wasm(r.read_fixed()?),
        1 => ContractExecutable::StellarAsset,
        other => {
            return Err(XdrError::InvalidDiscriminant {
                kind: "ContractExecutableType",
                value: other as i64,
            });
        }
    };

    let storage = r.read_option(|r| r.read_array(u32::MAX, decode_map_entry))?;

    Ok(ScContractInstance {
        executable,
        storage: storage.unwrap_or_default(),
    })
}

fn map_to_json(entries: &[ScMapEntry]) -> Value {
    Value::Array(
        entries
            .iter()
            .map(|entry| {
                json!({
                    "key": entry.key.to_json(),
                    "value": entry.val.to_json(),
                })
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use crate::domain::{
        scval::{ContractExecutable, ScAddress, ScContractInstance, ScError, ScMapEntry, ScVal},
        xdr::AccountId,
    };
    use serde_json::json;

    fn roundtrip(val: ScVal) -> ScVal {
        ScVal::from_bytes(&val.to_bytes()).unwrap()
    }

    #[test]
    fn test_roundtrip() {
        let vals = vec![
            ScVal::Bool(true),
            ScVal::Void,
            ScVal::Error(ScError {
                error_type: 1,
                code: 3,
            }),
            ScVal::U32(7),
            ScVal::I32(-7),
            ScVal::U64(u64::MAX),
            ScVal::I64(i64::MIN),
            ScVal::U128(u128::MAX),
            ScVal::I128(-1),
            ScVal::Bytes(vec![1, 2, 3]),
            ScVal::String("hello".to_string()),
            ScVal::Symbol("transfer".to_string()),
            ScVal::Vec(vec![ScVal::U32(1), ScVal::Symbol("x".to_string())]),
            ScVal::Map(vec![ScMapEntry {
                key: ScVal::Symbol("k".to_string()),
                val: ScVal::I128(12),
            }]),
            ScVal::Address(ScAddress::Contract([9; 32])),
            ScVal::LedgerKeyContractInstance,
        ];

        for val in vals {
            assert_eq!(roundtrip(val.clone()), val);
        }
    }

    #[test]
    fn test_u128_decimal_string() {
        // low half only
        assert_eq!(ScVal::U128(1_000_000).to_json(), json!("1000000"));
        // high = 1, low = 0 composes to 2^64
        assert_eq!(
            ScVal::U128(1u128 << 64).to_json(),
            json!("18446744073709551616")
        );
    }

    #[test]
    fn test_u128_halves_compose_on_wire() {
        // hi = 1, lo = 0 on the wire
        let bytes = ScVal::U128(1u128 << 64).to_bytes();
        let decoded = ScVal::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.to_json(), json!("18446744073709551616"));
    }

    #[test]
    fn test_i128_two_complement() {
        let val = roundtrip(ScVal::I128(-42));
        assert_eq!(val.to_json(), json!("-42"));

        let val = roundtrip(ScVal::I128(i128::MIN));
        assert_eq!(
            val.to_json(),
            json!("-170141183460469231731687303715884105728")
        );
    }

    #[test]
    fn test_map_preserves_order_and_non_string_keys() {
        let map = ScVal::Map(vec![
            ScMapEntry {
                key: ScVal::Symbol("b".to_string()),
                val: ScVal::U32(2),
            },
            ScMapEntry {
                key: ScVal::U32(1),
                val: ScVal::Symbol("a".to_string()),
            },
        ]);

        assert_eq!(
            map.to_json(),
            json!([
                {"key": "b", "value": 2},
                {"key": 1, "value": "a"},
            ])
        );
    }

    #[test]
    fn test_address_renders_strkey() {
        let account = ScVal::Address(ScAddress::Account(AccountId([0; 32])));
        assert_eq!(
            account.to_json(),
            json!("GAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAWHF")
        );

        let contract = ScVal::Address(ScAddress::Contract([1; 32]));
        assert!(contract.to_json().as_str().unwrap().starts_with('C'));
    }

    #[test]
    fn test_unprojectable_tags_render_null() {
        assert_eq!(
            ScVal::Error(ScError {
                error_type: 0,
                code: 1
            })
            .to_json(),
            serde_json::Value::Null
        );
        assert_eq!(ScVal::U256([1; 32]).to_json(), serde_json::Value::Null);
        assert_eq!(ScVal::Timepoint(12).to_json(), serde_json::Value::Null);
    }

    #[test]
    fn test_ledger_key_contract_instance_marker() {
        assert_eq!(
            ScVal::LedgerKeyContractInstance.to_json(),
            json!({"type": "LedgerKeyContractInstance"})
        );
    }

    #[test]
    fn test_contract_instance_json() {
        let instance = ScVal::ContractInstance(ScContractInstance {
            executable: ContractExecutable::Wasm([0xab; 32]),
            storage: vec![ScMapEntry {
                key: ScVal::Symbol("Admin".to_string()),
                val: ScVal::Address(ScAddress::Account(AccountId([0; 32]))),
            }],
        });

        let json = instance.to_json();
        assert_eq!(json["executable"]["type"], json!("Wasm"));
        assert_eq!(
            json["executable"]["wasmHash"],
            json!(const_hex::encode([0xab; 32]))
        );
        assert_eq!(json["storage"][0]["key"], json!("Admin"));
    }

    #[test]
    fn test_bytes_render_base64() {
        assert_eq!(ScVal::Bytes(vec![0, 1, 2]).to_json(), json!("AAEC"));
    }
}
