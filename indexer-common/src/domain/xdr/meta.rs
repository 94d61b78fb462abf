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

//! Transaction results and transaction metadata.
//!
//! Metadata exists in five versions; only v3 and v4 can carry contract-storage changes. The
//! decoder consumes the leading fields it needs and leaves the trailing Soroban/diagnostic
//! payload untouched, so exotic tail content cannot fail the artifact.

use crate::domain::{
    scval::ScVal,
    xdr::{
        Reader, XdrError,
        ledger::{LedgerEntry, LedgerKey, read_extension_point},
    },
};

/// The decoded portion of a transaction result: the charged fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionResult {
    pub fee_charged: i64,
}

impl TransactionResult {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, XdrError> {
        let mut r = Reader::new(bytes);
        Ok(Self {
            fee_charged: r.read_i64()?,
        })
    }
}

/// One ledger-entry change produced by a transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerEntryChange {
    Created(LedgerEntry),
    Updated(LedgerEntry),
    Removed(LedgerKey),
    State(LedgerEntry),
    Restored(LedgerEntry),
}

impl LedgerEntryChange {
    pub fn decode(r: &mut Reader) -> Result<Self, XdrError> {
        match r.read_u32()? {
            0 => Ok(Self::Created(LedgerEntry::decode(r)?)),
            1 => Ok(Self::Updated(LedgerEntry::decode(r)?)),
            2 => Ok(Self::Removed(LedgerKey::decode(r)?)),
            3 => Ok(Self::State(LedgerEntry::decode(r)?)),
            4 => Ok(Self::Restored(LedgerEntry::decode(r)?)),
            other => Err(XdrError::InvalidDiscriminant {
                kind: "LedgerEntryChangeType",
                value: other as i64,
            }),
        }
    }

    /// The new ledger entry carried by this change. `State` is a pre-image and `Removed` carries
    /// no entry; both yield nothing.
    pub fn entry(&self) -> Option<&LedgerEntry> {
        match self {
            Self::Created(entry) | Self::Updated(entry) | Self::Restored(entry) => Some(entry),
            Self::State(_) | Self::Removed(_) => None,
        }
    }
}

/// Per-transaction metadata. Versions v0 through v2 predate contract storage and decode to
/// empty shells.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionMeta {
    V0,
    V1,
    V2,
    V3 {
        operations: Vec<Vec<LedgerEntryChange>>,
        tx_changes_after: Vec<LedgerEntryChange>,
    },
    V4 {
        operations: Vec<Vec<LedgerEntryChange>>,
        tx_changes_after: Vec<LedgerEntryChange>,
    },
}

impl TransactionMeta {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, XdrError> {
        let mut r = Reader::new(bytes);

        match r.read_u32()? {
            0 => Ok(Self::V0),
            1 => Ok(Self::V1),
            2 => Ok(Self::V2),
            3 => {
                read_extension_point(&mut r)?;
                decode_changes(&mut r)?; // txChangesBefore
                let operations = r.read_array(u32::MAX, decode_changes)?;
                let tx_changes_after = decode_changes(&mut r)?;
                // sorobanMeta follows and is left untouched.
                Ok(Self::V3 {
                    operations,
                    tx_changes_after,
                })
            }
            4 => {
                read_extension_point(&mut r)?;
                decode_changes(&mut r)?; // txChangesBefore
                let operations = r.read_array(u32::MAX, |r| {
                    read_extension_point(r)?;
                    let changes = decode_changes(r)?;
                    r.read_array(u32::MAX, decode_contract_event)?;
                    Ok(changes)
                })?;
                let tx_changes_after = decode_changes(&mut r)?;
                Ok(Self::V4 {
                    operations,
                    tx_changes_after,
                })
            }
            other => Err(XdrError::InvalidDiscriminant {
                kind: "TransactionMeta",
                value: other as i64,
            }),
        }
    }

    /// All ledger-entry changes of interest: the post-transaction changes plus every
    /// per-operation change, in wire order.
    pub fn changes(&self) -> impl Iterator<Item = &LedgerEntryChange> {
        let (operations, after): (&[Vec<LedgerEntryChange>], &[LedgerEntryChange]) = match self {
            Self::V0 | Self::V1 | Self::V2 => (&[], &[]),
            Self::V3 {
                operations,
                tx_changes_after,
            }
            | Self::V4 {
                operations,
                tx_changes_after,
            } => (operations.as_slice(), tx_changes_after.as_slice()),
        };

        after.iter().chain(operations.iter().flatten())
    }
}

fn decode_changes(r: &mut Reader) -> Result<Vec<LedgerEntryChange>, XdrError> {
    r.read_array(u32::MAX, LedgerEntryChange::decode)
}

// Contract events inside v4 operation metadata are consumed for framing only.
fn decode_contract_event(r: &mut Reader) -> Result<(), XdrError> {
    read_extension_point(r)?;
    r.read_option(|r| r.read_fixed::<32>())?; // contractID
    r.read_u32()?; // ContractEventType

    match r.read_u32()? {
        0 => {
            r.read_array(u32::MAX, ScVal::decode)?; // topics
            ScVal::decode(r)?; // data
        }
        other => {
            return Err(XdrError::InvalidDiscriminant {
                kind: "ContractEventBody",
                value: other as i64,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::domain::{
        scval::{ScAddress, ScVal},
        xdr::{
            Writer,
            ledger::LedgerEntryData,
            meta::{LedgerEntryChange, TransactionMeta, TransactionResult},
        },
    };
    use assert_matches::assert_matches;

    fn contract_data_entry(w: &mut Writer, key: &ScVal, val: &ScVal) {
        w.put_u32(7); // lastModifiedLedgerSeq
        w.put_u32(6); // CONTRACT_DATA
        w.put_u32(0); // ext
        ScAddress::Contract([3; 32]).encode(w);
        key.encode(w);
        w.put_u32(1); // persistent
        val.encode(w);
        w.put_u32(0); // entry ext
    }

    #[test]
    fn test_result_fee_charged() {
        let mut w = Writer::new();
        w.put_i64(250);
        w.put_u32(0); // result code, left undecoded
        let result = TransactionResult::from_bytes(&w.into_bytes()).unwrap();
        assert_eq!(result.fee_charged, 250);
    }

    #[test]
    fn test_meta_v3_changes() {
        let mut w = Writer::new();
        w.put_u32(3); // version
        w.put_u32(0); // ext
        w.put_u32(0); // txChangesBefore
        w.put_u32(1); // one operation
        w.put_u32(2); // with two changes
        w.put_u32(0); // CREATED
        contract_data_entry(
            &mut w,
            &ScVal::Symbol("k".to_string()),
            &ScVal::U32(1),
        );
        w.put_u32(3); // STATE, must be ignored by entry()
        contract_data_entry(
            &mut w,
            &ScVal::Symbol("k".to_string()),
            &ScVal::U32(0),
        );
        w.put_u32(1); // txChangesAfter with one change
        w.put_u32(1); // UPDATED
        contract_data_entry(
            &mut w,
            &ScVal::Symbol("other".to_string()),
            &ScVal::U32(2),
        );
        w.put_u32(0); // sorobanMeta absent (left undecoded anyway)

        let meta = TransactionMeta::from_bytes(&w.into_bytes()).unwrap();
        let changes = meta.changes().collect::<Vec<_>>();
        assert_eq!(changes.len(), 3);

        // Only created/updated/restored yield entries.
        let entries = changes
            .iter()
            .filter_map(|change| change.entry())
            .collect::<Vec<_>>();
        assert_eq!(entries.len(), 2);
        assert_matches!(entries[0].data, LedgerEntryData::ContractData(_));
    }

    #[test]
    fn test_meta_pre_soroban_versions_have_no_changes() {
        for version in [0u32, 1, 2] {
            let mut w = Writer::new();
            w.put_u32(version);
            // Trailing content is irrelevant for these versions.
            let meta = TransactionMeta::from_bytes(&w.into_bytes()).unwrap();
            assert_eq!(meta.changes().count(), 0);
        }
    }

    #[test]
    fn test_meta_v4_operation_changes() {
        let mut w = Writer::new();
        w.put_u32(4); // version
        w.put_u32(0); // ext
        w.put_u32(0); // txChangesBefore
        w.put_u32(1); // one operation
        w.put_u32(0); // op ext
        w.put_u32(1); // one change
        w.put_u32(4); // RESTORED
        contract_data_entry(&mut w, &ScVal::Symbol("k".to_string()), &ScVal::U32(9));
        w.put_u32(0); // no contract events
        w.put_u32(0); // txChangesAfter

        let meta = TransactionMeta::from_bytes(&w.into_bytes()).unwrap();
        let changes = meta.changes().collect::<Vec<_>>();
        assert_eq!(changes.len(), 1);
        assert_matches!(changes[0], LedgerEntryChange::Restored(_));
    }
}
