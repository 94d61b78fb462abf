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

//! Strkey, the chain's checksummed base32 address format.
//!
//! A strkey is `base32(version_byte ‖ payload ‖ crc16_le)` without padding. The version byte
//! selects the leading character: `G` for accounts, `M` for multiplexed accounts, `C` for
//! contracts, `T` for pre-auth transaction hashes, `X` for SHA-256 hash-x signers.

use data_encoding::BASE32_NOPAD;
use thiserror::Error;

const VERSION_ACCOUNT: u8 = 6 << 3; // 'G'
const VERSION_MUXED_ACCOUNT: u8 = 12 << 3; // 'M'
const VERSION_PRE_AUTH_TX: u8 = 19 << 3; // 'T'
const VERSION_HASH_X: u8 = 23 << 3; // 'X'
const VERSION_CONTRACT: u8 = 2 << 3; // 'C'

/// Error possibly returned by strkey decoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StrkeyError {
    #[error("invalid base32")]
    InvalidBase32,

    #[error("invalid checksum")]
    InvalidChecksum,

    #[error("unexpected version byte {0}")]
    UnexpectedVersion(u8),

    #[error("unexpected payload length {0}")]
    UnexpectedLength(usize),
}

/// Encode an Ed25519 public key as a `G…` account address.
pub fn encode_account(key: &[u8; 32]) -> String {
    encode(VERSION_ACCOUNT, key)
}

/// Encode an Ed25519 public key plus multiplexing id as an `M…` address.
pub fn encode_muxed_account(key: &[u8; 32], id: u64) -> String {
    let mut payload = Vec::with_capacity(40);
    payload.extend_from_slice(key);
    payload.extend_from_slice(&id.to_be_bytes());
    encode(VERSION_MUXED_ACCOUNT, &payload)
}

/// Encode a contract id hash as a `C…` address.
pub fn encode_contract(hash: &[u8; 32]) -> String {
    encode(VERSION_CONTRACT, hash)
}

/// Encode a pre-auth transaction hash as a `T…` signer key.
pub fn encode_pre_auth_tx(hash: &[u8; 32]) -> String {
    encode(VERSION_PRE_AUTH_TX, hash)
}

/// Encode a SHA-256 preimage hash as an `X…` signer key.
pub fn encode_hash_x(hash: &[u8; 32]) -> String {
    encode(VERSION_HASH_X, hash)
}

/// Decode a `G…` account address into its Ed25519 public key.
pub fn decode_account(address: &str) -> Result<[u8; 32], StrkeyError> {
    decode_fixed(VERSION_ACCOUNT, address)
}

/// Decode a `C…` contract address into its contract id hash.
pub fn decode_contract(address: &str) -> Result<[u8; 32], StrkeyError> {
    decode_fixed(VERSION_CONTRACT, address)
}

fn encode(version: u8, payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(payload.len() + 3);
    data.push(version);
    data.extend_from_slice(payload);

    let checksum = crc16(&data);
    data.extend_from_slice(&checksum.to_le_bytes());

    BASE32_NOPAD.encode(&data)
}

fn decode(version: u8, input: &str) -> Result<Vec<u8>, StrkeyError> {
    let data = BASE32_NOPAD
        .decode(input.as_bytes())
        .map_err(|_| StrkeyError::InvalidBase32)?;

    if data.len() < 3 {
        return Err(StrkeyError::UnexpectedLength(data.len()));
    }

    let (body, checksum) = data.split_at(data.len() - 2);
    let expected = crc16(body).to_le_bytes();
    if checksum != expected {
        return Err(StrkeyError::InvalidChecksum);
    }

    if body[0] != version {
        return Err(StrkeyError::UnexpectedVersion(body[0]));
    }

    Ok(body[1..].to_vec())
}

fn decode_fixed(version: u8, input: &str) -> Result<[u8; 32], StrkeyError> {
    let payload = decode(version, input)?;
    let len = payload.len();
    payload
        .try_into()
        .map_err(|_| StrkeyError::UnexpectedLength(len))
}

/// CRC16-XModem (polynomial 0x1021, zero initial value).
fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;

    for byte in data {
        crc ^= (*byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }

    crc
}

#[cfg(test)]
mod tests {
    use crate::domain::strkey::{
        StrkeyError, decode_account, decode_contract, encode_account, encode_contract,
        encode_muxed_account,
    };
    use assert_matches::assert_matches;

    #[test]
    fn test_account_roundtrip() {
        let key = [7u8; 32];
        let address = encode_account(&key);

        assert!(address.starts_with('G'));
        assert_eq!(address.len(), 56);
        assert_eq!(decode_account(&address).unwrap(), key);
    }

    #[test]
    fn test_known_account() {
        // The all-zero public key has a well-known strkey.
        let address = encode_account(&[0; 32]);
        assert_eq!(
            address,
            "GAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAWHF"
        );
    }

    #[test]
    fn test_contract_roundtrip() {
        let hash = [0xabu8; 32];
        let address = encode_contract(&hash);

        assert!(address.starts_with('C'));
        assert_eq!(decode_contract(&address).unwrap(), hash);
    }

    #[test]
    fn test_muxed_account() {
        let address = encode_muxed_account(&[1; 32], 1234);
        assert!(address.starts_with('M'));
        assert_eq!(address.len(), 69);
    }

    #[test]
    fn test_decode_rejects_corruption() {
        let key = [7u8; 32];
        let mut address = encode_account(&key).into_bytes();
        // Flip one payload character.
        address[10] = if address[10] == b'A' { b'B' } else { b'A' };
        let address = String::from_utf8(address).unwrap();

        assert_matches!(decode_account(&address), Err(StrkeyError::InvalidChecksum));
    }

    #[test]
    fn test_decode_rejects_wrong_version() {
        let address = encode_contract(&[1; 32]);
        assert_matches!(
            decode_account(&address),
            Err(StrkeyError::UnexpectedVersion(_))
        );
    }
}
