use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage prefix under which every index snapshot object lives.
pub const INDEX_PREFIX: &str = "index/";

/// A 32-byte index snapshot identifier: unkeyed BLAKE2b-256 of the stored object.
///
/// Because the id is derived from the stored bytes, a snapshot whose content
/// no longer hashes to its key is detectably corrupt.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndexId(pub [u8; 32]);

impl IndexId {
    pub fn compute(stored: &[u8]) -> Self {
        IndexId(crate::blake2b_256(stored))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(hex_str: &str) -> std::result::Result<Self, String> {
        crate::decode_hex32(hex_str).map(IndexId)
    }

    /// Storage key path: `index/<hex>`.
    pub fn storage_key(&self) -> String {
        format!("{INDEX_PREFIX}{}", self.to_hex())
    }

    pub fn from_storage_key(key: &str) -> std::result::Result<Self, String> {
        let hex_str = key
            .strip_prefix(INDEX_PREFIX)
            .ok_or_else(|| format!("not an index key: '{key}'"))?;
        Self::from_hex(hex_str)
    }
}

impl fmt::Debug for IndexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IndexId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for IndexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}
