pub mod blob_id;
pub mod error;
pub mod index_id;
pub mod pack_id;

pub use blob_id::{BlobHandle, BlobId, BlobType};
pub use index_id::IndexId;
pub use pack_id::PackId;

use blake2::digest::{Update, VariableOutput};
use blake2::Blake2bVar;

/// Unkeyed BLAKE2b-256 of `data`. Used for every id derived from stored bytes.
pub(crate) fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2bVar::new(32).expect("valid output size");
    hasher.update(data);
    let mut out = [0u8; 32];
    hasher.finalize_variable(&mut out).expect("correct length");
    out
}

/// Decode a 64-character hex string into 32 raw bytes.
pub(crate) fn decode_hex32(hex_str: &str) -> std::result::Result<[u8; 32], String> {
    let bytes = hex::decode(hex_str).map_err(|e| format!("invalid hex: {e}"))?;
    if bytes.len() != 32 {
        return Err(format!("expected 32 bytes, got {}", bytes.len()));
    }
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}
