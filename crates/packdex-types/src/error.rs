use thiserror::Error;

use crate::{IndexId, PackId};

pub type Result<T> = std::result::Result<T, PackdexError>;

#[derive(Debug, Error)]
pub enum PackdexError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported backend: '{0}'")]
    UnsupportedBackend(String),

    #[error("pack not found: {0}")]
    PackNotFound(PackId),

    #[error("index snapshot not found: {0}")]
    IndexNotFound(IndexId),

    #[error("unable to read header of pack {pack_id}: {source}")]
    PackHeader {
        pack_id: PackId,
        #[source]
        source: Box<PackdexError>,
    },

    #[error("unable to decode index snapshot {index_id}: {source}")]
    IndexDecode {
        index_id: IndexId,
        #[source]
        source: Box<PackdexError>,
    },

    #[error("pack {pack_id} has conflicting entries in index snapshot {index_id}")]
    InconsistentPack { pack_id: PackId, index_id: IndexId },

    #[error("invalid repository format: {0}")]
    InvalidFormat(String),

    #[error("unknown object type tag: {0}")]
    UnknownObjectType(u8),

    #[error("unsupported index format version: {0}")]
    UnsupportedVersion(u32),

    #[error("serialization error: {0}")]
    Serialization(#[from] rmp_serde::encode::Error),

    #[error("deserialization error: {0}")]
    Deserialization(#[from] rmp_serde::decode::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl PackdexError {
    /// Wrap a failure that happened while reading the header of `pack_id`.
    pub fn pack_header(pack_id: PackId, source: PackdexError) -> Self {
        PackdexError::PackHeader {
            pack_id,
            source: Box::new(source),
        }
    }

    /// Wrap a failure that happened while decoding snapshot `index_id`.
    pub fn index_decode(index_id: IndexId, source: PackdexError) -> Self {
        PackdexError::IndexDecode {
            index_id,
            source: Box::new(source),
        }
    }
}
