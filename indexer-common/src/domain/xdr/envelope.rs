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

//! Transaction envelopes.
//!
//! Three envelope shapes exist on the wire: the legacy v0 (raw Ed25519 source key), v1, and the
//! fee-bump wrapper around an inner v1. Each decoded envelope retains the raw byte range of its
//! transaction body so the authoritative hash can be recomputed without re-encoding: the
//! signature payload is `SHA-256(network-id ‖ envelope-type ‖ transaction-bytes)`, and a v0
//! transaction converts to v1 form by prefixing the four zero bytes of the `KEY_TYPE_ED25519`
//! discriminant (optional time bounds and the v1 precondition union encode identically).

use crate::domain::{
    Hash, NetworkId,
    scval::{ScAddress, ScVal},
    sha256,
    xdr::{
        AccountId, Asset, ChangeTrustAsset, Claimant, ClaimableBalanceId, MuxedAccount, Price,
        Reader, SignerKey, XdrError,
        ledger::{LedgerKey, Signer, read_extension_point},
    },
};

const ENVELOPE_TYPE_TX_V0: u32 = 0;
const ENVELOPE_TYPE_TX: u32 = 2;
const ENVELOPE_TYPE_TX_FEE_BUMP: u32 = 5;

const MAX_OPERATIONS: u32 = 100;
const MAX_SIGNATURES: u32 = 20;

/// A signed transaction in one of the three envelope shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionEnvelope {
    V0(TransactionV0Envelope),
    V1(TransactionV1Envelope),
    FeeBump(FeeBumpTransactionEnvelope),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionV0Envelope {
    pub tx: TransactionV0,
    pub signatures: Vec<DecoratedSignature>,
    tx_bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionV1Envelope {
    pub tx: Transaction,
    pub signatures: Vec<DecoratedSignature>,
    tx_bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeeBumpTransactionEnvelope {
    pub tx: FeeBumpTransaction,
    pub signatures: Vec<DecoratedSignature>,
    tx_bytes: Vec<u8>,
}

/// The legacy transaction shape with a raw Ed25519 source key.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionV0 {
    pub source_account_ed25519: [u8; 32],
    pub fee: u32,
    pub seq_num: i64,
    pub time_bounds: Option<TimeBounds>,
    pub memo: Memo,
    pub operations: Vec<Operation>,
}

/// The v1 transaction shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub source_account: MuxedAccount,
    pub fee: u32,
    pub seq_num: i64,
    pub cond: Preconditions,
    pub memo: Memo,
    pub operations: Vec<Operation>,
}

/// The fee-bump wrapper: the outer shape contributes fee and fee source, the inner v1 carries
/// everything else.
#[derive(Debug, Clone, PartialEq)]
pub struct FeeBumpTransaction {
    pub fee_source: MuxedAccount,
    pub fee: i64,
    pub inner: TransactionV1Envelope,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecoratedSignature {
    pub hint: [u8; 4],
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Memo {
    None,
    Text(String),
    Id(u64),
    Hash(Hash),
    Return(Hash),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBounds {
    pub min_time: u64,
    pub max_time: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerBounds {
    pub min_ledger: u32,
    pub max_ledger: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Preconditions {
    None,
    Time(TimeBounds),
    V2(PreconditionsV2),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreconditionsV2 {
    pub time_bounds: Option<TimeBounds>,
    pub ledger_bounds: Option<LedgerBounds>,
    pub min_seq_num: Option<i64>,
    pub min_seq_age: u64,
    pub min_seq_ledger_gap: u32,
    pub extra_signers: Vec<SignerKey>,
}

impl TransactionEnvelope {
    /// Decode an envelope from a standalone buffer, requiring full consumption.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, XdrError> {
        let mut r = Reader::new(bytes);

        let envelope = match r.read_u32()? {
            ENVELOPE_TYPE_TX_V0 => {
                let start = r.pos();
                let tx = TransactionV0::decode(&mut r)?;
                let tx_bytes = r.slice_from(start).to_vec();
                let signatures = decode_signatures(&mut r)?;
                Self::V0(TransactionV0Envelope {
                    tx,
                    signatures,
                    tx_bytes,
                })
            }
            ENVELOPE_TYPE_TX => Self::V1(TransactionV1Envelope::decode(&mut r)?),
            ENVELOPE_TYPE_TX_FEE_BUMP => {
                let start = r.pos();
                let tx = FeeBumpTransaction::decode(&mut r)?;
                let tx_bytes = r.slice_from(start).to_vec();
                let signatures = decode_signatures(&mut r)?;
                Self::FeeBump(FeeBumpTransactionEnvelope {
                    tx,
                    signatures,
                    tx_bytes,
                })
            }
            other => {
                return Err(XdrError::InvalidDiscriminant {
                    kind: "EnvelopeType",
                    value: other as i64,
                });
            }
        };

        r.finish()?;
        Ok(envelope)
    }

    /// The operations carried by this envelope (the inner transaction's for fee bumps).
    pub fn operations(&self) -> &[Operation] {
        match self {
            Self::V0(envelope) => &envelope.tx.operations,
            Self::V1(envelope) => &envelope.tx.operations,
            Self::FeeBump(envelope) => &envelope.tx.inner.tx.operations,
        }
    }

    /// The source the operations fall back to when they carry none of their own.
    pub fn operation_source(&self) -> MuxedAccount {
        match self {
            Self::V0(envelope) => MuxedAccount::Ed25519(envelope.tx.source_account_ed25519),
            Self::V1(envelope) => envelope.tx.source_account,
            Self::FeeBump(envelope) => envelope.tx.inner.tx.source_account,
        }
    }

    /// The fee-paying source of the outermost shape.
    pub fn fee_source(&self) -> MuxedAccount {
        match self {
            Self::V0(envelope) => MuxedAccount::Ed25519(envelope.tx.source_account_ed25519),
            Self::V1(envelope) => envelope.tx.source_account,
            Self::FeeBump(envelope) => envelope.tx.fee_source,
        }
    }

    pub fn fee(&self) -> i64 {
        match self {
            Self::V0(envelope) => envelope.tx.fee as i64,
            Self::V1(envelope) => envelope.tx.fee as i64,
            Self::FeeBump(envelope) => envelope.tx.fee,
        }
    }

    /// The sequence number (the inner transaction's for fee bumps).
    pub fn seq_num(&self) -> i64 {
        match self {
            Self::V0(envelope) => envelope.tx.seq_num,
            Self::V1(envelope) => envelope.tx.seq_num,
            Self::FeeBump(envelope) => envelope.tx.inner.tx.seq_num,
        }
    }

    pub fn memo(&self) -> &Memo {
        match self {
            Self::V0(envelope) => &envelope.tx.memo,
            Self::V1(envelope) => &envelope.tx.memo,
            Self::FeeBump(envelope) => &envelope.tx.inner.tx.memo,
        }
    }

    /// Preconditions in their v2-shaped normal form (v0 time bounds map onto the time variant).
    pub fn preconditions(&self) -> Preconditions {
        match self {
            Self::V0(envelope) => envelope
                .tx
                .time_bounds
                .map(Preconditions::Time)
                .unwrap_or(Preconditions::None),
            Self::V1(envelope) => envelope.tx.cond.clone(),
            Self::FeeBump(envelope) => envelope.tx.inner.tx.cond.clone(),
        }
    }

    /// The outermost signatures.
    pub fn signatures(&self) -> &[DecoratedSignature] {
        match self {
            Self::V0(envelope) => &envelope.signatures,
            Self::V1(envelope) => &envelope.signatures,
            Self::FeeBump(envelope) => &envelope.signatures,
        }
    }

    pub fn is_fee_bump(&self) -> bool {
        matches!(self, Self::FeeBump(_))
    }

    /// The signature payload this envelope is hashed and signed under: the transaction hash.
    pub fn hash(&self, network_id: NetworkId) -> Hash {
        let mut payload = Vec::with_capacity(40 + self.tx_bytes().len());
        payload.extend_from_slice(&network_id.0);

        match self {
            // A v0 transaction hashes as its v1 conversion.
            Self::V0(_) => {
                payload.extend_from_slice(&ENVELOPE_TYPE_TX.to_be_bytes());
                payload.extend_from_slice(&0u32.to_be_bytes());
            }
            Self::V1(_) => payload.extend_from_slice(&ENVELOPE_TYPE_TX.to_be_bytes()),
            Self::FeeBump(_) => {
                payload.extend_from_slice(&ENVELOPE_TYPE_TX_FEE_BUMP.to_be_bytes())
            }
        }

        payload.extend_from_slice(self.tx_bytes());
        sha256(&payload)
    }

    /// The transaction hash as lowercase hex.
    pub fn hash_hex(&self, network_id: NetworkId) -> String {
        const_hex::encode(self.hash(network_id))
    }

    fn tx_bytes(&self) -> &[u8] {
        match self {
            Self::V0(envelope) => &envelope.tx_bytes,
            Self::V1(envelope) => &envelope.tx_bytes,
            Self::FeeBump(envelope) => &envelope.tx_bytes,
        }
    }
}

impl TransactionV0 {
    fn decode(r: &mut Reader) -> Result<Self, XdrError> {
        let tx = Self {
            source_account_ed25519: r.read_fixed()?,
            fee: r.read_u32()?,
            seq_num: r.read_i64()?,
            time_bounds: r.read_option(TimeBounds::decode)?,
            memo: Memo::decode(r)?,
            operations: r.read_array(MAX_OPERATIONS, Operation::decode)?,
        };

        read_extension_point(r)?;

        Ok(tx)
    }
}

impl TransactionV1Envelope {
    fn decode(r: &mut Reader) -> Result<Self, XdrError> {
        let start = r.pos();
        let tx = Transaction::decode(r)?;
        let tx_bytes = r.slice_from(start).to_vec();
        let signatures = decode_signatures(r)?;

        Ok(Self {
            tx,
            signatures,
            tx_bytes,
        })
    }
}

impl Transaction {
    fn decode(r: &mut Reader) -> Result<Self, XdrError> {
        let tx = Self {
            source_account: MuxedAccount::decode(r)?,
            fee: r.read_u32()?,
            seq_num: r.read_i64()?,
            cond: Preconditions::decode(r)?,
            memo: Memo::decode(r)?,
            operations: r.read_array(MAX_OPERATIONS, Operation::decode)?,
        };

        decode_transaction_ext(r)?;

        Ok(tx)
    }
}

impl FeeBumpTransaction {
    fn decode(r: &mut Reader) -> Result<Self, XdrError> {
        let fee_source = MuxedAccount::decode(r)?;
        let fee = r.read_i64()?;

        let inner = match r.read_u32()? {
            ENVELOPE_TYPE_TX => TransactionV1Envelope::decode(r)?,
            other => {
                return Err(XdrError::InvalidDiscriminant {
                    kind: "FeeBumpInnerType",
                    value: other as i64,
                });
            }
        };

        read_extension_point(r)?;

        Ok(Self {
            fee_source,
            fee,
            inner,
        })
    }
}

impl TimeBounds {
    fn decode(r: &mut Reader) -> Result<Self, XdrError> {
        Ok(Self {
            min_time: r.read_u64()?,
            max_time: r.read_u64()?,
        })
    }
}

impl Memo {
    fn decode(r: &mut Reader) -> Result<Self, XdrError> {
        match r.read_u32()? {
            0 => Ok(Self::None),
            1 => Ok(Self::Text(r.read_string(28)?)),
            2 => Ok(Self::Id(r.read_u64()?)),
            3 => Ok(Self::Hash(r.read_fixed()?)),
            4 => Ok(Self::Return(r.read_fixed()?)),
            other => Err(XdrError::InvalidDiscriminant {
                kind: "MemoType",
                value: other as i64,
            }),
        }
    }
}

impl Preconditions {
    fn decode(r: &mut Reader) -> Result<Self, XdrError> {
        match r.read_u32()? {
            0 => Ok(Self::None),
            1 => Ok(Self::Time(TimeBounds::decode(r)?)),
            2 => Ok(Self::V2(PreconditionsV2 {
                time_bounds: r.read_option(TimeBounds::decode)?,
                ledger_bounds: r.read_option(|r| {
                    Ok(LedgerBounds {
                        min_ledger: r.read_u32()?,
                        max_ledger: r.read_u32()?,
                    })
                })?,
                min_seq_num: r.read_option(|r| r.read_i64())?,
                min_seq_age: r.read_u64()?,
                min_seq_ledger_gap: r.read_u32()?,
                extra_signers: r.read_array(2, SignerKey::decode)?,
            })),
            other => Err(XdrError::InvalidDiscriminant {
                kind: "PreconditionType",
                value: other as i64,
            }),
        }
    }
}

fn decode_signatures(r: &mut Reader) -> Result<Vec<DecoratedSignature>, XdrError> {
    r.read_array(MAX_SIGNATURES, |r| {
        Ok(DecoratedSignature {
            hint: r.read_fixed()?,
            signature: r.read_var_bytes(64)?,
        })
    })
}

// Transaction ext v1 carries Soroban resource data; it is consumed for framing only.
fn decode_transaction_ext(r: &mut Reader) -> Result<(), XdrError> {
    match r.read_u32()? {
        0 => Ok(()),
        1 => decode_soroban_transaction_data(r),
        other => Err(XdrError::InvalidDiscriminant {
            kind: "TransactionExt",
            value: other as i64,
        }),
    }
}

fn decode_soroban_transaction_data(r: &mut Reader) -> Result<(), XdrError> {
    match r.read_u32()? {
        0 => {}
        1 => {
            // SorobanResourcesExtV0: archived entry indices.
            r.read_array(u32::MAX, |r| r.read_u32())?;
        }
        other => {
            return Err(XdrError::InvalidDiscriminant {
                kind: "SorobanTransactionDataExt",
                value: other as i64,
            });
        }
    }

    // LedgerFootprint.
    r.read_array(u32::MAX, LedgerKey::decode)?;
    r.read_array(u32::MAX, LedgerKey::decode)?;

    r.read_u32()?; // instructions
    r.read_u32()?; // readBytes
    r.read_u32()?; // writeBytes
    r.read_i64()?; // resourceFee

    Ok(())
}

/// One operation of a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub source_account: Option<MuxedAccount>,
    pub body: OperationBody,
}

impl Operation {
    fn decode(r: &mut Reader) -> Result<Self, XdrError> {
        Ok(Self {
            source_account: r.read_option(MuxedAccount::decode)?,
            body: OperationBody::decode(r)?,
        })
    }
}

/// The typed payload of an [Operation].
#[derive(Debug, Clone, PartialEq)]
pub enum OperationBody {
    CreateAccount {
        destination: AccountId,
        starting_balance: i64,
    },
    Payment {
        destination: MuxedAccount,
        asset: Asset,
        amount: i64,
    },
    PathPaymentStrictReceive {
        send_asset: Asset,
        send_max: i64,
        destination: MuxedAccount,
        dest_asset: Asset,
        dest_amount: i64,
        path: Vec<Asset>,
    },
    ManageSellOffer {
        selling: Asset,
        buying: Asset,
        amount: i64,
        price: Price,
        offer_id: i64,
    },
    CreatePassiveSellOffer {
        selling: Asset,
        buying: Asset,
        amount: i64,
        price: Price,
    },
    SetOptions {
        inflation_dest: Option<AccountId>,
        clear_flags: Option<u32>,
        set_flags: Option<u32>,
        master_weight: Option<u32>,
        low_threshold: Option<u32>,
        med_threshold: Option<u32>,
        high_threshold: Option<u32>,
        home_domain: Option<String>,
        signer: Option<Signer>,
    },
    ChangeTrust {
        line: ChangeTrustAsset,
        limit: i64,
    },
    AllowTrust {
        trustor: AccountId,
        asset_code: String,
        authorize: u32,
    },
    AccountMerge {
        destination: MuxedAccount,
    },
    Inflation,
    ManageData {
        data_name: String,
        data_value: Option<Vec<u8>>,
    },
    BumpSequence {
        bump_to: i64,
    },
    ManageBuyOffer {
        selling: Asset,
        buying: Asset,
        buy_amount: i64,
        price: Price,
        offer_id: i64,
    },
    PathPaymentStrictSend {
        send_asset: Asset,
        send_amount: i64,
        destination: MuxedAccount,
        dest_asset: Asset,
        dest_min: i64,
        path: Vec<Asset>,
    },
    CreateClaimableBalance {
        asset: Asset,
        amount: i64,
        claimants: Vec<Claimant>,
    },
    ClaimClaimableBalance {
        balance_id: ClaimableBalanceId,
    },
    BeginSponsoringFutureReserves {
        sponsored_id: AccountId,
    },
    EndSponsoringFutureReserves,
    RevokeSponsorship(RevokeSponsorship),
    Clawback {
        asset: Asset,
        from: MuxedAccount,
        amount: i64,
    },
    ClawbackClaimableBalance {
        balance_id: ClaimableBalanceId,
    },
    SetTrustLineFlags {
        trustor: AccountId,
        asset: Asset,
        clear_flags: u32,
        set_flags: u32,
    },
    LiquidityPoolDeposit {
        pool_id: Hash,
        max_amount_a: i64,
        max_amount_b: i64,
        min_price: Price,
        max_price: Price,
    },
    LiquidityPoolWithdraw {
        pool_id: Hash,
        amount: i64,
        min_amount_a: i64,
        min_amount_b: i64,
    },
    InvokeHostFunction {
        host_function: HostFunction,
    },
    ExtendFootprintTtl {
        extend_to: u32,
    },
    RestoreFootprint,
}

/// The target of a revoke-sponsorship operation.
#[derive(Debug, Clone, PartialEq)]
pub enum RevokeSponsorship {
    LedgerEntry(LedgerKey),
    Signer {
        account_id: AccountId,
        signer_key: SignerKey,
    },
}

/// A host function invocation payload.
#[derive(Debug, Clone, PartialEq)]
pub enum HostFunction {
    InvokeContract {
        contract: ScAddress,
        function: String,
    },
    CreateContract,
    CreateContractV2,
    UploadWasm(Vec<u8>),
}

impl HostFunction {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::InvokeContract { .. } => "HostFunctionTypeInvokeContract",
            Self::CreateContract => "HostFunctionTypeCreateContract",
            Self::CreateContractV2 => "HostFunctionTypeCreateContractV2",
            Self::UploadWasm(_) => "HostFunctionTypeUploadContractWasm",
        }
    }
}

impl OperationBody {
    fn decode(r: &mut Reader) -> Result<Self, XdrError> {
        let body = match r.read_u32()? {
            0 => Self::CreateAccount {
                destination: AccountId::decode(r)?,
                starting_balance: r.read_i64()?,
            },
            1 => Self::Payment {
                destination: MuxedAccount::decode(r)?,
                asset: Asset::decode(r)?,
                amount: r.read_i64()?,
            },
            2 => Self::PathPaymentStrictReceive {
                send_asset: Asset::decode(r)?,
                send_max: r.read_i64()?,
                destination: MuxedAccount::decode(r)?,
                dest_asset: Asset::decode(r)?,
                dest_amount: r.read_i64()?,
                path: r.read_array(5, Asset::decode)?,
            },
            3 => Self::ManageSellOffer {
                selling: Asset::decode(r)?,
                buying: Asset::decode(r)?,
                amount: r.read_i64()?,
                price: Price::decode(r)?,
                offer_id: r.read_i64()?,
            },
            4 => Self::CreatePassiveSellOffer {
                selling: Asset::decode(r)?,
                buying: Asset::decode(r)?,
                amount: r.read_i64()?,
                price: Price::decode(r)?,
            },
            5 => Self::SetOptions {
                inflation_dest: r.read_option(AccountId::decode)?,
                clear_flags: r.read_option(|r| r.read_u32())?,
                set_flags: r.read_option(|r| r.read_u32())?,
                master_weight: r.read_option(|r| r.read_u32())?,
                low_threshold: r.read_option(|r| r.read_u32())?,
                med_threshold: r.read_option(|r| r.read_u32())?,
                high_threshold: r.read_option(|r| r.read_u32())?,
                home_domain: r.read_option(|r| r.read_string(32))?,
                signer: r.read_option(|r| {
                    Ok(Signer {
                        key: SignerKey::decode(r)?,
                        weight: r.read_u32()?,
                    })
                })?,
            },
            6 => Self::ChangeTrust {
                line: ChangeTrustAsset::decode(r)?,
                limit: r.read_i64()?,
            },
            7 => Self::AllowTrust {
                trustor: AccountId::decode(r)?,
                asset_code: decode_asset_code(r)?,
                authorize: r.read_u32()?,
            },
            8 => Self::AccountMerge {
                destination: MuxedAccount::decode(r)?,
            },
            9 => Self::Inflation,
            10 => Self::ManageData {
                data_name: r.read_string(64)?,
                data_value: r.read_option(|r| r.read_var_bytes(64))?,
            },
            11 => Self::BumpSequence {
                bump_to: r.read_i64()?,
            },
            12 => Self::ManageBuyOffer {
                selling: Asset::decode(r)?,
                buying: Asset::decode(r)?,
                buy_amount: r.read_i64()?,
                price: Price::decode(r)?,
                offer_id: r.read_i64()?,
            },
            13 => Self::PathPaymentStrictSend {
                send_asset: Asset::decode(r)?,
                send_amount: r.read_i64()?,
                destination: MuxedAccount::decode(r)?,
                dest_asset: Asset::decode(r)?,
                dest_min: r.read_i64()?,
                path: r.read_array(5, Asset::decode)?,
            },
            14 => Self::CreateClaimableBalance {
                asset: Asset::decode(r)?,
                amount: r.read_i64()?,
                claimants: r.read_array(10, Claimant::decode)?,
            },
            15 => Self::ClaimClaimableBalance {
                balance_id: ClaimableBalanceId::decode(r)?,
            },
            16 => Self::BeginSponsoringFutureReserves {
                sponsored_id: AccountId::decode(r)?,
            },
            17 => Self::EndSponsoringFutureReserves,
            18 => Self::RevokeSponsorship(match r.read_u32()? {
                0 => RevokeSponsorship::LedgerEntry(LedgerKey::decode(r)?),
                1 => RevokeSponsorship::Signer {
                    account_id: AccountId::decode(r)?,
                    signer_key: SignerKey::decode(r)?,
                },
                other => {
                    return Err(XdrError::InvalidDiscriminant {
                        kind: "RevokeSponsorshipType",
                        value: other as i64,
                    });
                }
            }),
            19 => Self::Clawback {
                asset: Asset::decode(r)?,
                from: MuxedAccount::decode(r)?,
                amount: r.read_i64()?,
            },
            20 => Self::ClawbackClaimableBalance {
                balance_id: ClaimableBalanceId::decode(r)?,
            },
            21 => Self::SetTrustLineFlags {
                trustor: AccountId::decode(r)?,
                asset: Asset::decode(r)?,
                clear_flags: r.read_u32()?,
                set_flags: r.read_u32()?,
            },
            22 => Self::LiquidityPoolDeposit {
                pool_id: r.read_fixed()?,
                max_amount_a: r.read_i64()?,
                max_amount_b: r.read_i64()?,
                min_price: Price::decode(r)?,
                max_price: Price::decode(r)?,
            },
            23 => Self::LiquidityPoolWithdraw {
                pool_id: r.read_fixed()?,
                amount: r.read_i64()?,
                min_amount_a: r.read_i64()?,
                min_amount_b: r.read_i64()?,
            },
            24 => {
                let host_function = HostFunction::decode(r)?;
                // Authorization entries are consumed for framing only.
                r.read_array(u32::MAX, decode_authorization_entry)?;
                Self::InvokeHostFunction { host_function }
            }
            25 => {
                read_extension_point(r)?;
                Self::ExtendFootprintTtl {
                    extend_to: r.read_u32()?,
                }
            }
            26 => {
                read_extension_point(r)?;
                Self::RestoreFootprint
            }
            other => {
                return Err(XdrError::InvalidDiscriminant {
                    kind: "OperationType",
                    value: other as i64,
                });
            }
        };

        Ok(body)
    }

    /// The operation type string persisted in the store.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::CreateAccount { .. } => "OperationTypeCreateAccount",
            Self::Payment { .. } => "OperationTypePayment",
            Self::PathPaymentStrictReceive { .. } => "OperationTypePathPaymentStrictReceive",
            Self::ManageSellOffer { .. } => "OperationTypeManageSellOffer",
            Self::CreatePassiveSellOffer { .. } => "OperationTypeCreatePassiveSellOffer",
            Self::SetOptions { .. } => "OperationTypeSetOptions",
            Self::ChangeTrust { .. } => "OperationTypeChangeTrust",
            Self::AllowTrust { .. } => "OperationTypeAllowTrust",
            Self::AccountMerge { .. } => "OperationTypeAccountMerge",
            Self::Inflation => "OperationTypeInflation",
            Self::ManageData { .. } => "OperationTypeManageData",
            Self::BumpSequence { .. } => "OperationTypeBumpSequence",
            Self::ManageBuyOffer { .. } => "OperationTypeManageBuyOffer",
            Self::PathPaymentStrictSend { .. } => "OperationTypePathPaymentStrictSend",
            Self::CreateClaimableBalance { .. } => "OperationTypeCreateClaimableBalance",
            Self::ClaimClaimableBalance { .. } => "OperationTypeClaimClaimableBalance",
            Self::BeginSponsoringFutureReserves { .. } => {
                "OperationTypeBeginSponsoringFutureReserves"
            }
            Self::EndSponsoringFutureReserves => "OperationTypeEndSponsoringFutureReserves",
            Self::RevokeSponsorship(_) => "OperationTypeRevokeSponsorship",
            Self::Clawback { .. } => "OperationTypeClawback",
            Self::ClawbackClaimableBalance { .. } => "OperationTypeClawbackClaimableBalance",
            Self::SetTrustLineFlags { .. } => "OperationTypeSetTrustLineFlags",
            Self::LiquidityPoolDeposit { .. } => "OperationTypeLiquidityPoolDeposit",
            Self::LiquidityPoolWithdraw { .. } => "OperationTypeLiquidityPoolWithdraw",
            Self::InvokeHostFunction { .. } => "OperationTypeInvokeHostFunction",
            Self::ExtendFootprintTtl { .. } => "OperationTypeExtendFootprintTtl",
            Self::RestoreFootprint => "OperationTypeRestoreFootprint",
        }
    }
}

impl HostFunction {
    fn decode(r: &mut Reader) -> Result<Self, XdrError> {
        match r.read_u32()? {
            0 => {
                let contract = ScAddress::decode(r)?;
                let function = r.read_string(32)?;
                r.read_array(u32::MAX, ScVal::decode)?;
                Ok(Self::InvokeContract { contract, function })
            }
            1 => {
                decode_create_contract_args(r)?;
                Ok(Self::CreateContract)
            }
            2 => Ok(Self::UploadWasm(r.read_var_bytes(u32::MAX)?)),
            3 => {
                decode_create_contract_args(r)?;
                r.read_array(u32::MAX, ScVal::decode)?;
                Ok(Self::CreateContractV2)
            }
            other => Err(XdrError::InvalidDiscriminant {
                kind: "HostFunctionType",
                value: other as i64,
            }),
        }
    }
}

fn decode_create_contract_args(r: &mut Reader) -> Result<(), XdrError> {
    match r.read_u32()? {
        // CONTRACT_ID_PREIMAGE_FROM_ADDRESS
        0 => {
            ScAddress::decode(r)?;
            r.read_fixed::<32>()?; // salt
        }
        // CONTRACT_ID_PREIMAGE_FROM_ASSET
        1 => {
            Asset::decode(r)?;
        }
        other => {
            return Err(XdrError::InvalidDiscriminant {
                kind: "ContractIdPreimageType",
                value: other as i64,
            });
        }
    }

    // ContractExecutable.
    match r.read_u32()? {
        0 => {
            r.read_fixed::<32>()?;
        }
        1 => {}
        other => {
            return Err(XdrError::InvalidDiscriminant {
                kind: "ContractExecutableType",
                value: other as i64,
            });
        }
    }

    Ok(())
}

fn decode_authorization_entry(r: &mut Reader) -> Result<(), XdrError> {
    match r.read_u32()? {
        // SOROBAN_CREDENTIALS_SOURCE_ACCOUNT
        0 => {}
        // SOROBAN_CREDENTIALS_ADDRESS
        1 => {
            ScAddress::decode(r)?;
            r.read_i64()?; // nonce
            r.read_u32()?; // signatureExpirationLedger
            ScVal::decode(r)?; // signature
        }
        other => {
            return Err(XdrError::InvalidDiscriminant {
                kind: "SorobanCredentialsType",
                value: other as i64,
            });
        }
    }

    decode_authorized_invocation(r)
}

fn decode_authorized_invocation(r: &mut Reader) -> Result<(), XdrError> {
    match r.read_u32()? {
        0 => {
            ScAddress::decode(r)?;
            r.read_string(32)?;
            r.read_array(u32::MAX, ScVal::decode)?;
        }
        1 => decode_create_contract_args(r)?,
        2 => {
            decode_create_contract_args(r)?;
            r.read_array(u32::MAX, ScVal::decode)?;
        }
        other => {
            return Err(XdrError::InvalidDiscriminant {
                kind: "SorobanAuthorizedFunctionType",
                value: other as i64,
            });
        }
    }

    r.read_array(u32::MAX, |r| decode_authorized_invocation(r))?;

    Ok(())
}

fn decode_asset_code(r: &mut Reader) -> Result<String, XdrError> {
    match r.read_u32()? {
        1 => {
            let code: [u8; 4] = r.read_fixed()?;
            Ok(super::trim_code(&code))
        }
        2 => {
            let code: [u8; 12] = r.read_fixed()?;
            Ok(super::trim_code(&code))
        }
        other => Err(XdrError::InvalidDiscriminant {
            kind: "AssetCodeType",
            value: other as i64,
        }),
    }
}

#[cfg(test)]
pub mod testing {
    //! Writers assembling envelope fixtures for tests.

    use crate::domain::xdr::Writer;

    /// Append a minimal v1 transaction (no time bounds, no memo) with the given operation
    /// bodies already encoded.
    pub fn put_transaction(w: &mut Writer, source: &[u8; 32], fee: u32, seq: i64, ops: &[Vec<u8>]) {
        w.put_u32(0); // KEY_TYPE_ED25519
        w.put_fixed(source);
        w.put_u32(fee);
        w.put_i64(seq);
        w.put_u32(0); // PRECOND_NONE
        w.put_u32(0); // MEMO_NONE
        w.put_u32(ops.len() as u32);
        for op in ops {
            w.put_fixed(op);
        }
        w.put_u32(0); // ext
    }

    /// An operation without an explicit source and the given encoded body.
    pub fn put_operation(w: &mut Writer, body: &[u8]) {
        w.put_u32(0); // no source account
        w.put_fixed(body);
    }

    /// A v1 envelope around [put_transaction] with no signatures.
    pub fn v1_envelope(source: &[u8; 32], fee: u32, seq: i64, op_bodies: &[Vec<u8>]) -> Vec<u8> {
        let ops = op_bodies
            .iter()
            .map(|body| {
                let mut w = Writer::new();
                put_operation(&mut w, body);
                w.into_bytes()
            })
            .collect::<Vec<_>>();

        let mut w = Writer::new();
        w.put_u32(2); // ENVELOPE_TYPE_TX
        put_transaction(&mut w, source, fee, seq, &ops);
        w.put_u32(0); // signatures
        w.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::{
        NetworkId,
        xdr::{
            Writer,
            envelope::{
                HostFunction, Memo, OperationBody, Preconditions, TransactionEnvelope, testing,
            },
        },
    };
    use assert_matches::assert_matches;

    fn payment_body() -> Vec<u8> {
        let mut w = Writer::new();
        w.put_u32(1); // PAYMENT
        w.put_u32(0); // destination KEY_TYPE_ED25519
        w.put_fixed(&[2; 32]);
        w.put_u32(0); // native asset
        w.put_i64(5_000);
        w.into_bytes()
    }

    fn upload_wasm_body(wasm: &[u8]) -> Vec<u8> {
        let mut w = Writer::new();
        w.put_u32(24); // INVOKE_HOST_FUNCTION
        w.put_u32(2); // UPLOAD_CONTRACT_WASM
        w.put_var_bytes(wasm);
        w.put_u32(0); // no auth entries
        w.into_bytes()
    }

    #[test]
    fn test_v1_envelope_decode() {
        let bytes = testing::v1_envelope(&[1; 32], 100, 42, &[payment_body()]);
        let envelope = TransactionEnvelope::from_bytes(&bytes).unwrap();

        assert_eq!(envelope.fee(), 100);
        assert_eq!(envelope.seq_num(), 42);
        assert_eq!(envelope.memo(), &Memo::None);
        assert_matches!(envelope.preconditions(), Preconditions::None);
        assert_eq!(envelope.operations().len(), 1);
        assert_matches!(
            envelope.operations()[0].body,
            OperationBody::Payment { amount: 5_000, .. }
        );
        assert!(!envelope.is_fee_bump());
    }

    #[test]
    fn test_upload_wasm_decode() {
        let wasm = [0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00];
        let bytes = testing::v1_envelope(&[1; 32], 100, 1, &[upload_wasm_body(&wasm)]);
        let envelope = TransactionEnvelope::from_bytes(&bytes).unwrap();

        assert_matches!(
            &envelope.operations()[0].body,
            OperationBody::InvokeHostFunction {
                host_function: HostFunction::UploadWasm(bytes)
            } if bytes == &wasm
        );
    }

    #[test]
    fn test_hash_deterministic_and_passphrase_sensitive() {
        let bytes = testing::v1_envelope(&[1; 32], 100, 42, &[payment_body()]);
        let envelope = TransactionEnvelope::from_bytes(&bytes).unwrap();

        let testnet = NetworkId::from_passphrase("Test SDF Network ; September 2015");
        let mainnet = NetworkId::from_passphrase("Public Global Stellar Network ; September 2015");

        assert_eq!(envelope.hash(testnet), envelope.hash(testnet));
        assert_ne!(envelope.hash(testnet), envelope.hash(mainnet));
        assert_eq!(envelope.hash_hex(testnet).len(), 64);
    }

    #[test]
    fn test_v0_hashes_as_v1_conversion() {
        // A v0 transaction: raw source key, optional time bounds absent.
        let mut v0_tx = Writer::new();
        v0_tx.put_fixed(&[1; 32]);
        v0_tx.put_u32(100);
        v0_tx.put_i64(42);
        v0_tx.put_u32(0); // no time bounds
        v0_tx.put_u32(0); // MEMO_NONE
        let ops = {
            let mut w = Writer::new();
            testing::put_operation(&mut w, &payment_body());
            w.into_bytes()
        };
        v0_tx.put_u32(1);
        v0_tx.put_fixed(&ops);
        v0_tx.put_u32(0); // ext
        let v0_tx = v0_tx.into_bytes();

        let mut v0_envelope = Writer::new();
        v0_envelope.put_u32(0); // ENVELOPE_TYPE_TX_V0
        v0_envelope.put_fixed(&v0_tx);
        v0_envelope.put_u32(0); // signatures
        let v0_envelope = TransactionEnvelope::from_bytes(&v0_envelope.into_bytes()).unwrap();

        // The equivalent v1 envelope.
        let v1_envelope = TransactionEnvelope::from_bytes(&testing::v1_envelope(
            &[1; 32],
            100,
            42,
            &[payment_body()],
        ))
        .unwrap();

        let network_id = NetworkId::from_passphrase("Test SDF Network ; September 2015");
        assert_eq!(v0_envelope.hash(network_id), v1_envelope.hash(network_id));
    }

    #[test]
    fn test_fee_bump_envelope() {
        let inner_ops = {
            let mut w = Writer::new();
            testing::put_operation(&mut w, &payment_body());
            w.into_bytes()
        };

        let mut w = Writer::new();
        w.put_u32(5); // ENVELOPE_TYPE_TX_FEE_BUMP
        w.put_u32(0); // fee source KEY_TYPE_ED25519
        w.put_fixed(&[9; 32]);
        w.put_i64(1_000);
        w.put_u32(2); // inner ENVELOPE_TYPE_TX
        testing::put_transaction(&mut w, &[1; 32], 100, 42, &[inner_ops]);
        w.put_u32(0); // inner signatures
        w.put_u32(0); // fee bump ext
        w.put_u32(0); // outer signatures

        let envelope = TransactionEnvelope::from_bytes(&w.into_bytes()).unwrap();

        assert!(envelope.is_fee_bump());
        assert_eq!(envelope.fee(), 1_000);
        assert_eq!(envelope.seq_num(), 42);
        assert_eq!(envelope.fee_source().ed25519(), &[9; 32]);
        assert_eq!(envelope.operation_source().ed25519(), &[1; 32]);
        assert_eq!(envelope.operations().len(), 1);
    }

    #[test]
    fn test_unknown_envelope_type() {
        let mut w = Writer::new();
        w.put_u32(7);
        let result = TransactionEnvelope::from_bytes(&w.into_bytes());
        assert!(result.is_err());
    }
}
