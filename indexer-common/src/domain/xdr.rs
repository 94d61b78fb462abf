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

//! XDR (RFC 4506) wire format for the chain's ledger artifacts.
//!
//! Only the subset of the chain's schema the indexer consumes is modeled: transaction envelopes,
//! results, transaction metadata, ledger entries and the self-describing scalar. All quantities
//! are big-endian, all variable-length data is padded to four-byte boundaries.

pub mod envelope;
pub mod ledger;
pub mod meta;

use crate::domain::{Hash, strkey};
use thiserror::Error;

/// Error returned by XDR decoding.
#[derive(Debug, Error)]
pub enum XdrError {
    #[error("unexpected end of input at offset {0}")]
    UnexpectedEof(usize),

    #[error("invalid boolean value {0}")]
    InvalidBool(u32),

    #[error("invalid optional marker {0}")]
    InvalidOptional(u32),

    #[error("invalid discriminant {value} for {kind}")]
    InvalidDiscriminant { kind: &'static str, value: i64 },

    #[error("length {0} exceeds maximum {1}")]
    LengthExceeded(u32, u32),

    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    #[error("{0} trailing bytes after decoding")]
    TrailingBytes(usize),
}

/// Sequential reader over an XDR-encoded buffer.
#[derive(Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// The current offset into the buffer.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// The bytes between the given start offset and the current position.
    pub fn slice_from(&self, start: usize) -> &'a [u8] {
        &self.buf[start..self.pos]
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Fail unless the buffer is fully consumed.
    pub fn finish(&self) -> Result<(), XdrError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(XdrError::TrailingBytes(self.buf.len() - self.pos))
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], XdrError> {
        if self.buf.len() - self.pos < n {
            return Err(XdrError::UnexpectedEof(self.pos));
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    pub fn read_u32(&mut self) -> Result<u32, XdrError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes(bytes.try_into().expect("four bytes")))
    }

    pub fn read_i32(&mut self) -> Result<i32, XdrError> {
        self.read_u32().map(|value| value as i32)
    }

    pub fn read_u64(&mut self) -> Result<u64, XdrError> {
        let bytes = self.take(8)?;
        Ok(u64::from_be_bytes(bytes.try_into().expect("eight bytes")))
    }

    pub fn read_i64(&mut self) -> Result<i64, XdrError> {
        self.read_u64().map(|value| value as i64)
    }

    pub fn read_bool(&mut self) -> Result<bool, XdrError> {
        match self.read_u32()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(XdrError::InvalidBool(other)),
        }
    }

    /// Fixed-length opaque data of a compile-time size; sizes in this schema are multiples of
    /// four, so no padding applies.
    pub fn read_fixed<const N: usize>(&mut self) -> Result<[u8; N], XdrError> {
        let bytes = self.take(N)?;
        Ok(bytes.try_into().expect("N bytes"))
    }

    /// Variable-length opaque data: four-byte length followed by data padded to four bytes.
    pub fn read_var_bytes(&mut self, max: u32) -> Result<Vec<u8>, XdrError> {
        let len = self.read_u32()?;
        if len > max {
            return Err(XdrError::LengthExceeded(len, max));
        }

        let bytes = self.take(len as usize)?.to_vec();
        let padding = (4 - len as usize % 4) % 4;
        self.take(padding)?;

        Ok(bytes)
    }

    /// Variable-length string, padded like opaque data.
    pub fn read_string(&mut self, max: u32) -> Result<String, XdrError> {
        let bytes = self.read_var_bytes(max)?;
        String::from_utf8(bytes).map_err(|_| XdrError::InvalidUtf8)
    }

    /// XDR optional: boolean marker followed by the value when present.
    pub fn read_option<T>(
        &mut self,
        read: impl FnOnce(&mut Self) -> Result<T, XdrError>,
    ) -> Result<Option<T>, XdrError> {
        match self.read_u32()? {
            0 => Ok(None),
            1 => read(self).map(Some),
            other => Err(XdrError::InvalidOptional(other)),
        }
    }

    /// Variable-length array: four-byte count followed by the elements.
    pub fn read_array<T>(
        &mut self,
        max: u32,
        mut read: impl FnMut(&mut Self) -> Result<T, XdrError>,
    ) -> Result<Vec<T>, XdrError> {
        let len = self.read_u32()?;
        if len > max {
            return Err(XdrError::LengthExceeded(len, max));
        }

        let mut items = Vec::with_capacity(len.min(1024) as usize);
        for _ in 0..len {
            items.push(read(self)?);
        }

        Ok(items)
    }
}

/// Sequential writer producing an XDR-encoded buffer.
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn put_i32(&mut self, value: i32) {
        self.put_u32(value as u32);
    }

    pub fn put_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn put_i64(&mut self, value: i64) {
        self.put_u64(value as u64);
    }

    pub fn put_bool(&mut self, value: bool) {
        self.put_u32(value as u32);
    }

    pub fn put_fixed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn put_var_bytes(&mut self, bytes: &[u8]) {
        self.put_u32(bytes.len() as u32);
        self.buf.extend_from_slice(bytes);
        let padding = (4 - bytes.len() % 4) % 4;
        self.buf.extend_from_slice(&[0; 3][..padding]);
    }

    pub fn put_string(&mut self, value: &str) {
        self.put_var_bytes(value.as_bytes());
    }
}

/// An account identifier: an Ed25519 public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountId(pub [u8; 32]);

impl AccountId {
    pub fn decode(r: &mut Reader) -> Result<Self, XdrError> {
        match r.read_u32()? {
            // PUBLIC_KEY_TYPE_ED25519
            0 => Ok(Self(r.read_fixed()?)),
            other => Err(XdrError::InvalidDiscriminant {
                kind: "PublicKeyType",
                value: other as i64,
            }),
        }
    }

    pub fn encode(&self, w: &mut Writer) {
        w.put_u32(0);
        w.put_fixed(&self.0);
    }

    /// Canonical `G…` strkey form.
    pub fn address(&self) -> String {
        strkey::encode_account(&self.0)
    }
}

/// A transaction source which is either a plain account or a multiplexed account carrying a
/// 64-bit sub-account id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuxedAccount {
    Ed25519([u8; 32]),
    Muxed { id: u64, ed25519: [u8; 32] },
}

impl MuxedAccount {
    pub fn decode(r: &mut Reader) -> Result<Self, XdrError> {
        match r.read_u32()? {
            // KEY_TYPE_ED25519
            0 => Ok(Self::Ed25519(r.read_fixed()?)),
            // KEY_TYPE_MUXED_ED25519
            0x100 => Ok(Self::Muxed {
                id: r.read_u64()?,
                ed25519: r.read_fixed()?,
            }),
            other => Err(XdrError::InvalidDiscriminant {
                kind: "CryptoKeyType",
                value: other as i64,
            }),
        }
    }

    pub fn ed25519(&self) -> &[u8; 32] {
        match self {
            Self::Ed25519(key) => key,
            Self::Muxed { ed25519, .. } => ed25519,
        }
    }

    /// The multiplexing id, when present.
    pub fn muxed_id(&self) -> Option<u64> {
        match self {
            Self::Ed25519(_) => None,
            Self::Muxed { id, .. } => Some(*id),
        }
    }

    /// The strkey form of this source: `M…` when multiplexed, `G…` otherwise.
    pub fn address(&self) -> String {
        match self {
            Self::Ed25519(key) => strkey::encode_account(key),
            Self::Muxed { id, ed25519 } => strkey::encode_muxed_account(ed25519, *id),
        }
    }

    /// The strkey form of the underlying account, discarding any multiplexing id.
    pub fn account_address(&self) -> String {
        strkey::encode_account(self.ed25519())
    }
}

/// A classic asset: the native lumen or an alphanumeric code issued by an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Asset {
    Native,
    CreditAlphanum4 { code: [u8; 4], issuer: AccountId },
    CreditAlphanum12 { code: [u8; 12], issuer: AccountId },
}

impl Asset {
    pub fn decode(r: &mut Reader) -> Result<Self, XdrError> {
        match r.read_u32()? {
            0 => Ok(Self::Native),
            1 => Ok(Self::CreditAlphanum4 {
                code: r.read_fixed()?,
                issuer: AccountId::decode(r)?,
            }),
            2 => Ok(Self::CreditAlphanum12 {
                code: r.read_fixed()?,
                issuer: AccountId::decode(r)?,
            }),
            other => Err(XdrError::InvalidDiscriminant {
                kind: "AssetType",
                value: other as i64,
            }),
        }
    }

    pub fn encode(&self, w: &mut Writer) {
        match self {
            Self::Native => w.put_u32(0),
            Self::CreditAlphanum4 { code, issuer } => {
                w.put_u32(1);
                w.put_fixed(code);
                issuer.encode(w);
            }
            Self::CreditAlphanum12 { code, issuer } => {
                w.put_u32(2);
                w.put_fixed(code);
                issuer.encode(w);
            }
        }
    }

    /// The numeric asset type tag as encoded on the wire.
    pub fn type_tag(&self) -> i32 {
        match self {
            Self::Native => 0,
            Self::CreditAlphanum4 { .. } => 1,
            Self::CreditAlphanum12 { .. } => 2,
        }
    }

    /// The asset code with trailing NUL bytes stripped, `"XLM"` for the native asset.
    pub fn code(&self) -> String {
        match self {
            Self::Native => "XLM".to_string(),
            Self::CreditAlphanum4 { code, .. } => trim_code(code),
            Self::CreditAlphanum12 { code, .. } => trim_code(code),
        }
    }

    pub fn issuer(&self) -> Option<String> {
        match self {
            Self::Native => None,
            Self::CreditAlphanum4 { issuer, .. } | Self::CreditAlphanum12 { issuer, .. } => {
                Some(issuer.address())
            }
        }
    }
}

/// The asset referenced by a trust line, which may also be a liquidity pool share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustLineAsset {
    Asset(Asset),
    PoolShare([u8; 32]),
}

impl TrustLineAsset {
    pub fn decode(r: &mut Reader) -> Result<Self, XdrError> {
        match r.read_u32()? {
            0 => Ok(Self::Asset(Asset::Native)),
            1 => Ok(Self::Asset(Asset::CreditAlphanum4 {
                code: r.read_fixed()?,
                issuer: AccountId::decode(r)?,
            })),
            2 => Ok(Self::Asset(Asset::CreditAlphanum12 {
                code: r.read_fixed()?,
                issuer: AccountId::decode(r)?,
            })),
            // ASSET_TYPE_POOL_SHARE
            3 => Ok(Self::PoolShare(r.read_fixed()?)),
            other => Err(XdrError::InvalidDiscriminant {
                kind: "AssetType",
                value: other as i64,
            }),
        }
    }

    pub fn encode(&self, w: &mut Writer) {
        match self {
            Self::Asset(asset) => asset.encode(w),
            Self::PoolShare(pool_id) => {
                w.put_u32(3);
                w.put_fixed(pool_id);
            }
        }
    }

    pub fn type_tag(&self) -> i32 {
        match self {
            Self::Asset(asset) => asset.type_tag(),
            Self::PoolShare(_) => 3,
        }
    }
}

/// The asset referenced by a change-trust operation, which may be liquidity pool parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeTrustAsset {
    Asset(Asset),
    PoolShare {
        asset_a: Asset,
        asset_b: Asset,
        fee: i32,
    },
}

impl ChangeTrustAsset {
    pub fn decode(r: &mut Reader) -> Result<Self, XdrError> {
        match r.read_u32()? {
            0 => Ok(Self::Asset(Asset::Native)),
            1 => Ok(Self::Asset(Asset::CreditAlphanum4 {
                code: r.read_fixed()?,
                issuer: AccountId::decode(r)?,
            })),
            2 => Ok(Self::Asset(Asset::CreditAlphanum12 {
                code: r.read_fixed()?,
                issuer: AccountId::decode(r)?,
            })),
            3 => {
                // LiquidityPoolParameters, constant product only.
                match r.read_u32()? {
                    0 => Ok(Self::PoolShare {
                        asset_a: Asset::decode(r)?,
                        asset_b: Asset::decode(r)?,
                        fee: r.read_i32()?,
                    }),
                    other => Err(XdrError::InvalidDiscriminant {
                        kind: "LiquidityPoolType",
                        value: other as i64,
                    }),
                }
            }
            other => Err(XdrError::InvalidDiscriminant {
                kind: "AssetType",
                value: other as i64,
            }),
        }
    }
}

/// A price as a rational number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Price {
    pub n: i32,
    pub d: i32,
}

impl Price {
    pub fn decode(r: &mut Reader) -> Result<Self, XdrError> {
        Ok(Self {
            n: r.read_i32()?,
            d: r.read_i32()?,
        })
    }

    /// The canonical rational rendering `"N/D"`, `"0"` for a zero denominator. Consumers must
    /// treat this as a fraction, not evaluate it.
    pub fn as_rational_string(&self) -> String {
        if self.d == 0 {
            "0".to_string()
        } else {
            format!("{}/{}", self.n, self.d)
        }
    }
}

/// A signer key as used in account options and transaction preconditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignerKey {
    Ed25519([u8; 32]),
    PreAuthTx([u8; 32]),
    HashX([u8; 32]),
    Ed25519SignedPayload { ed25519: [u8; 32], payload: Vec<u8> },
}

impl SignerKey {
    pub fn decode(r: &mut Reader) -> Result<Self, XdrError> {
        match r.read_u32()? {
            0 => Ok(Self::Ed25519(r.read_fixed()?)),
            1 => Ok(Self::PreAuthTx(r.read_fixed()?)),
            2 => Ok(Self::HashX(r.read_fixed()?)),
            3 => Ok(Self::Ed25519SignedPayload {
                ed25519: r.read_fixed()?,
                payload: r.read_var_bytes(64)?,
            }),
            other => Err(XdrError::InvalidDiscriminant {
                kind: "SignerKeyType",
                value: other as i64,
            }),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Ed25519(_) => "ed25519",
            Self::PreAuthTx(_) => "pre_auth_tx",
            Self::HashX(_) => "hash_x",
            Self::Ed25519SignedPayload { .. } => "ed25519_signed_payload",
        }
    }

    /// The strkey form of this signer key.
    pub fn address(&self) -> String {
        match self {
            Self::Ed25519(key) => strkey::encode_account(key),
            Self::PreAuthTx(hash) => strkey::encode_pre_auth_tx(hash),
            Self::HashX(hash) => strkey::encode_hash_x(hash),
            // The payload form has no short strkey; fall back to the account key.
            Self::Ed25519SignedPayload { ed25519, .. } => strkey::encode_account(ed25519),
        }
    }
}

/// A claimant of a claimable balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claimant {
    pub destination: AccountId,
    pub predicate: ClaimPredicate,
}

impl Claimant {
    pub fn decode(r: &mut Reader) -> Result<Self, XdrError> {
        match r.read_u32()? {
            // CLAIMANT_TYPE_V0
            0 => Ok(Self {
                destination: AccountId::decode(r)?,
                predicate: ClaimPredicate::decode(r)?,
            }),
            other => Err(XdrError::InvalidDiscriminant {
                kind: "ClaimantType",
                value: other as i64,
            }),
        }
    }
}

/// The (recursive) predicate guarding a claimable balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimPredicate {
    Unconditional,
    And(Vec<ClaimPredicate>),
    Or(Vec<ClaimPredicate>),
    Not(Option<Box<ClaimPredicate>>),
    BeforeAbsoluteTime(i64),
    BeforeRelativeTime(i64),
}

impl ClaimPredicate {
    pub fn decode(r: &mut Reader) -> Result<Self, XdrError> {
        match r.read_u32()? {
            0 => Ok(Self::Unconditional),
            1 => Ok(Self::And(r.read_array(2, ClaimPredicate::decode)?)),
            2 => Ok(Self::Or(r.read_array(2, ClaimPredicate::decode)?)),
            3 => Ok(Self::Not(
                r.read_option(ClaimPredicate::decode)?.map(Box::new),
            )),
            4 => Ok(Self::BeforeAbsoluteTime(r.read_i64()?)),
            5 => Ok(Self::BeforeRelativeTime(r.read_i64()?)),
            other => Err(XdrError::InvalidDiscriminant {
                kind: "ClaimPredicateType",
                value: other as i64,
            }),
        }
    }
}

/// A claimable balance identifier, hex-rendered on all external surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimableBalanceId(pub Hash);

impl ClaimableBalanceId {
    pub fn decode(r: &mut Reader) -> Result<Self, XdrError> {
        match r.read_u32()? {
            // CLAIMABLE_BALANCE_ID_TYPE_V0
            0 => Ok(Self(r.read_fixed()?)),
            other => Err(XdrError::InvalidDiscriminant {
                kind: "ClaimableBalanceIdType",
                value: other as i64,
            }),
        }
    }

    pub fn encode(&self, w: &mut Writer) {
        w.put_u32(0);
        w.put_fixed(&self.0);
    }

    pub fn to_hex(&self) -> String {
        const_hex::encode(self.0)
    }
}

pub(crate) fn trim_code(code: &[u8]) -> String {
    let end = code
        .iter()
        .position(|byte| *byte == 0)
        .unwrap_or(code.len());
    String::from_utf8_lossy(&code[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use crate::domain::xdr::{Asset, MuxedAccount, Price, Reader, Writer, XdrError};
    use assert_matches::assert_matches;

    #[test]
    fn test_reader_primitives() {
        let mut w = Writer::new();
        w.put_u32(7);
        w.put_i64(-1);
        w.put_bool(true);
        w.put_var_bytes(b"abcde");
        let bytes = w.into_bytes();

        let mut r = Reader::new(&bytes);
        assert_eq!(r.read_u32().unwrap(), 7);
        assert_eq!(r.read_i64().unwrap(), -1);
        assert!(r.read_bool().unwrap());
        assert_eq!(r.read_var_bytes(32).unwrap(), b"abcde");
        assert!(r.finish().is_ok());
    }

    #[test]
    fn test_var_bytes_padding() {
        let mut w = Writer::new();
        w.put_var_bytes(b"ab");
        let bytes = w.into_bytes();

        // Four-byte length plus two data bytes plus two padding bytes.
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[6..], [0, 0]);
    }

    #[test]
    fn test_reader_eof() {
        let mut r = Reader::new(&[0, 0]);
        assert_matches!(r.read_u32(), Err(XdrError::UnexpectedEof(0)));
    }

    #[test]
    fn test_muxed_account_roundtrip_address() {
        let account = MuxedAccount::Ed25519([0; 32]);
        assert!(account.address().starts_with('G'));
        assert_eq!(account.muxed_id(), None);

        let muxed = MuxedAccount::Muxed {
            id: 42,
            ed25519: [0; 32],
        };
        assert!(muxed.address().starts_with('M'));
        assert_eq!(muxed.muxed_id(), Some(42));
        assert_eq!(muxed.account_address(), account.address());
    }

    #[test]
    fn test_asset_code_trimming() {
        let asset = Asset::CreditAlphanum4 {
            code: *b"USD\0",
            issuer: crate::domain::xdr::AccountId([1; 32]),
        };
        assert_eq!(asset.code(), "USD");
        assert_eq!(Asset::Native.code(), "XLM");
    }

    #[test]
    fn test_price_rendering() {
        assert_eq!(Price { n: 1, d: 2 }.as_rational_string(), "1/2");
        assert_eq!(Price { n: 5, d: 0 }.as_rational_string(), "0");
    }
}
