//! Envelope shared by every sealed object in a repository:
//! `[type tag][crypto payload]`. The tag and a caller-chosen context are
//! bound into the AAD so an object cannot be replayed as another kind.

use crate::crypto::CryptoEngine;
use crate::error::{PackdexError, Result};

const AAD_DOMAIN: &[u8] = b"packdex:object-context:v1\0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ObjectType {
    PackHeader = 1,
    IndexSnapshot = 2,
}

impl TryFrom<u8> for ObjectType {
    type Error = PackdexError;

    fn try_from(tag: u8) -> Result<Self> {
        match tag {
            1 => Ok(Self::PackHeader),
            2 => Ok(Self::IndexSnapshot),
            other => Err(PackdexError::UnknownObjectType(other)),
        }
    }
}

fn aad_for(kind: ObjectType, context: &[u8]) -> Vec<u8> {
    [&[kind as u8][..], AAD_DOMAIN, context].concat()
}

/// Seal `plaintext` as an object of `kind` bound to `context`.
pub fn seal_object(
    kind: ObjectType,
    context: &[u8],
    plaintext: &[u8],
    crypto: &dyn CryptoEngine,
) -> Result<Vec<u8>> {
    let payload = crypto.encrypt(plaintext, &aad_for(kind, context))?;
    let mut sealed = vec![kind as u8];
    sealed.extend(payload);
    Ok(sealed)
}

/// Open an object written by [`seal_object`]. Fails unless it carries the
/// `kind` tag and was sealed under the same `context`.
pub fn open_object(
    stored: &[u8],
    kind: ObjectType,
    context: &[u8],
    crypto: &dyn CryptoEngine,
) -> Result<Vec<u8>> {
    let (&tag, payload) = stored
        .split_first()
        .ok_or_else(|| PackdexError::InvalidFormat("empty object".into()))?;
    let found = ObjectType::try_from(tag)?;
    if found != kind {
        return Err(PackdexError::InvalidFormat(format!(
            "expected {kind:?} object, found {found:?}"
        )));
    }
    crypto.decrypt(payload, &aad_for(kind, context))
}
