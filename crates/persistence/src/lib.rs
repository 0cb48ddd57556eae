#![deny(warnings)]

//! Session snapshot codec.
//!
//! Encodes any serializable session value as `MAGIC | version (u16 LE) |
//! bincode payload`. Hosting services keep the bytes wherever they like; this
//! crate does not touch storage itself. [`export_json`] produces a readable
//! dump for debugging and visualizations.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{Read, Write};
use thiserror::Error;
use tracing::debug;

/// Leading bytes of every snapshot.
pub const MAGIC: [u8; 4] = *b"RPLS";
/// Bumped whenever a serialized state type changes shape.
pub const FORMAT_VERSION: u16 = 1;

const HEADER_LEN: usize = MAGIC.len() + 2;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("not a session snapshot (bad header)")]
    BadHeader,
    #[error("snapshot format version {found}, expected {expected}")]
    VersionMismatch { found: u16, expected: u16 },
    #[error("codec failure: {0}")]
    Codec(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<bincode::Error> for PersistError {
    fn from(err: bincode::Error) -> Self {
        PersistError::Codec(err.to_string())
    }
}

impl From<serde_json::Error> for PersistError {
    fn from(err: serde_json::Error) -> Self {
        PersistError::Codec(err.to_string())
    }
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, PersistError> {
    let payload = bincode::serialize(value)?;
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&payload);
    debug!(bytes = out.len(), "snapshot encoded");
    Ok(out)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, PersistError> {
    if bytes.len() < HEADER_LEN || bytes[..MAGIC.len()] != MAGIC {
        return Err(PersistError::BadHeader);
    }
    let found = u16::from_le_bytes([bytes[MAGIC.len()], bytes[MAGIC.len() + 1]]);
    if found != FORMAT_VERSION {
        return Err(PersistError::VersionMismatch {
            found,
            expected: FORMAT_VERSION,
        });
    }
    Ok(bincode::deserialize(&bytes[HEADER_LEN..])?)
}

/// Write a snapshot to any sink.
pub fn write_to<T: Serialize, W: Write>(value: &T, mut sink: W) -> Result<(), PersistError> {
    sink.write_all(&encode(value)?)?;
    sink.flush()?;
    Ok(())
}

/// Read a whole snapshot from any source.
pub fn read_from<T: DeserializeOwned, R: Read>(mut source: R) -> Result<T, PersistError> {
    let mut bytes = Vec::new();
    source.read_to_end(&mut bytes)?;
    decode(&bytes)
}

/// Pretty JSON, e.g. of a `StateSnapshot`.
pub fn export_json<T: Serialize>(value: &T) -> Result<String, PersistError> {
    Ok(serde_json::to_string_pretty(value)?)
}
