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

pub mod scval;
pub mod strkey;
pub mod xdr;

use sha2::{Digest, Sha256};

/// A 32-byte chain hash, e.g. a transaction hash or a WASM hash.
pub type Hash = [u8; 32];

/// SHA-256 of the given bytes.
pub fn sha256(bytes: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// The network identifier under which transaction hashes are computed: the SHA-256 of the
/// network passphrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkId(pub Hash);

impl NetworkId {
    pub fn from_passphrase(passphrase: &str) -> Self {
        Self(sha256(passphrase.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::NetworkId;

    #[test]
    fn test_network_id_from_passphrase() {
        let a = NetworkId::from_passphrase("Test SDF Network ; September 2015");
        let b = NetworkId::from_passphrase("Test SDF Network ; September 2015");
        let c = NetworkId::from_passphrase("Public Global Stellar Network ; September 2015");

        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
