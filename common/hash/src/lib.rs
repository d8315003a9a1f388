// Copyright 2026 Stitch Authors.
// This file is part of Stitch.

// Stitch is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// Stitch is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with Stitch.  If not, see <http://www.gnu.org/licenses/>.

use tiny_keccak::{Hasher, Keccak};

/// Keccak-256 digest of `data`. Node keys of the secure trie are the
/// digest of the node's RLP encoding.
pub fn keccak_256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let mut ctx = Keccak::v256();
    ctx.update(data);
    ctx.finalize(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::keccak_256;

    #[test]
    fn known_digests() {
        assert_eq!(
            hex::encode(&keccak_256(b"")[..]),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
        // rlp of the null item, hashing to the empty trie root
        assert_eq!(
            hex::encode(&keccak_256(&[0x80])[..]),
            "56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421"
        );
    }
}
