use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage prefix under which every pack object lives.
pub const PACKS_PREFIX: &str = "packs/";

/// A 32-byte pack file identifier computed as unkeyed BLAKE2b-256.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PackId(pub [u8; 32]);

impl PackId {
    /// Compute a pack ID as unkeyed BLAKE2b-256 of the entire pack contents.
    pub fn compute(data: &[u8]) -> Self {
        PackId(crate::blake2b_256(data))
    }

    /// Hex-encode the full pack ID.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(hex_str: &str) -> std::result::Result<Self, String> {
        crate::decode_hex32(hex_str).map(PackId)
    }

    /// First byte as a two-char hex string, used for shard directory.
    pub fn shard_prefix(&self) -> String {
        hex::encode(&self.0[..1])
    }

    /// Storage key path: `packs/<shard>/<full_hex>`.
    pub fn storage_key(&self) -> String {
        format!("{PACKS_PREFIX}{}/{}", self.shard_prefix(), self.to_hex())
    }

    /// Parse a storage key produced by [`PackId::storage_key`].
    ///
    /// The shard directory must match the first byte of the id.
    pub fn from_storage_key(key: &str) -> std::result::Result<Self, String> {
        let rest = key
            .strip_prefix(PACKS_PREFIX)
            .ok_or_else(|| format!("not a pack key: '{key}'"))?;
        let (shard, hex_str) = rest
            .split_once('/')
            .ok_or_else(|| format!("pack key without shard: '{key}'"))?;
        let id = Self::from_hex(hex_str)?;
        if id.shard_prefix() != shard {
            return Err(format!("pack key in wrong shard: '{key}'"));
        }
        Ok(id)
    }
}

impl fmt::Debug for PackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PackId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for PackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}
