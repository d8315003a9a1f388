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

use std::fmt;

use hex;
pub use hex::FromHexError as HexError;
use rlp::{Encodable, RlpStream};

use byteorder::{BigEndian, WriteBytesExt};

/// 32 byte value doing double duty: the Keccak-256 key of a trie node
/// encoding, and the full 64 nibble path of a secure-trie leaf. The
/// all-zero value reads as "absent". Derived `Ord` is the big-endian
/// 256 bit integer order, which is also the store's byte order.
#[derive(Default, Copy, Clone, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    pub fn as_bytes(&self) -> &[u8] {
        return &self.0;
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Right-aligned copy of up to 32 source bytes.
    pub fn from_bytes(src: &[u8]) -> Self {
        let mut h = Self::default();
        if src.len() <= 32 {
            h.0[(32 - src.len())..].copy_from_slice(src);
        } else {
            h.0.copy_from_slice(&src[(src.len() - 32)..])
        }
        h
    }

    pub fn from_hex(text: &str) -> Result<Self, HexError> {
        let mut from = text;
        if text.starts_with("0x") || text.starts_with("0X") {
            from = &text[2..];
        }
        let b = hex::decode(from)?;

        Ok(Hash::from_bytes(&b))
    }

    pub fn make_hash(data: &[u8]) -> Self {
        Hash(hash::keccak_256(data))
    }

    pub fn from_u64(val: u64) -> Self {
        let mut buf = vec![];
        buf.write_u64::<BigEndian>(val).unwrap();
        Self::from_bytes(&buf)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for i in self.0.iter() {
            write!(f, "{:02x}", i)?;
        }
        Ok(())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x")?;
        for i in self.0[..4].iter() {
            write!(f, "{:02x}", i)?;
        }
        Ok(())
    }
}

impl fmt::LowerHex for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x")?;
        for i in self.0[..4].iter() {
            write!(f, "{:02x}", i)?;
        }
        Ok(())
    }
}

impl AsRef<[u8]> for Hash {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        return &self.0;
    }
}

impl AsMut<[u8]> for Hash {
    #[inline]
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl From<&[u8]> for Hash {
    fn from(src: &[u8]) -> Self {
        Hash::from_bytes(src)
    }
}

impl From<[u8; 32]> for Hash {
    fn from(src: [u8; 32]) -> Self {
        Hash(src)
    }
}

impl Encodable for Hash {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.encoder().encode_value(&self.0);
    }
}

#[cfg(test)]
mod tests {
    use super::Hash;

    #[test]
    fn test_hash_parsing() {
        let h = Hash::from_hex("0x00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff")
            .unwrap();
        assert_eq!(format!("{:?}", h).len(), 64);
        assert_eq!(format!("{}", h), "0x00112233");
        assert_eq!(h, Hash::from_bytes(h.as_bytes()));

        assert!(Hash::default().is_zero());
        assert!(!h.is_zero());
    }

    #[test]
    fn test_hash_ordering() {
        // big-endian integer order
        assert!(Hash::from_u64(1) < Hash::from_u64(2));
        assert!(Hash::from_u64(0x0100) > Hash::from_u64(0xff));
        assert_eq!(Hash::from_u64(7).as_bytes()[31], 7);
    }

    #[test]
    fn test_node_key() {
        // empty trie root is the keccak of the rlp null item
        let root = Hash::make_hash(&[0x80]);
        assert_eq!(
            format!("{:?}", root),
            "56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421"
        );
    }
}
