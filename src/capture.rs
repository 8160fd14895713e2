//! Capture storage records.
//!
//! The protocol core hands off `(payload bytes, semantic metadata)`
//! pairs; this module persists them as content-addressed JSON records.
//! Small payloads travel inline (gzip, then base64); large ones are
//! referenced by filename and stored next to the capture file. Either
//! way the record carries the payload's SHA-256, and loading verifies it
//! before handing data back.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::instrument::Identity;

/// Errors from encoding, decoding or verifying capture records.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Inline payload is not valid base64.
    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Inline payload failed to compress or decompress.
    #[error("gzip error: {0}")]
    Gzip(#[from] std::io::Error),

    /// The blob's payload lives in an external file.
    #[error("blob is stored externally in {filename}")]
    ExternalStorage {
        /// Name of the file holding the payload.
        filename: String,
    },

    /// Payload digest does not match the recorded one.
    ///
    /// Tampered/corrupt data or a wrong file reference.
    #[error("sha256 mismatch: recorded {recorded}, payload {actual}")]
    ChecksumMismatch { recorded: String, actual: String },

    /// Payload length does not match the recorded one.
    #[error("length mismatch: recorded {recorded}, payload {actual}")]
    LengthMismatch { recorded: u64, actual: u64 },
}

/// Lowercase hex SHA-256 digest of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    Sha256::digest(data)
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// Where a blob's payload bytes live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "storage", rename_all = "lowercase")]
pub enum BlobStorage {
    /// Payload embedded in the record: gzip, then base64.
    Inline { gzip_compressed_data: String },
    /// Payload in a sibling file.
    External { filename: String },
}

/// One captured payload: digest, format tag, storage and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobRecord {
    /// Uncompressed payload length in bytes.
    pub length: u64,
    /// Format tag, e.g. "png" or "waveform-bytes".
    pub format: String,
    /// Lowercase hex SHA-256 of the uncompressed payload.
    pub sha256: String,
    #[serde(flatten)]
    pub storage: BlobStorage,
    /// Semantic metadata supplied by the capturing driver.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

impl BlobRecord {
    /// Build an inline record from a payload.
    pub fn inline(
        data: &[u8],
        format: &str,
        meta: Option<serde_json::Value>,
    ) -> Result<Self, CaptureError> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data)?;
        let compressed = encoder.finish()?;
        Ok(Self {
            length: data.len() as u64,
            format: format.to_owned(),
            sha256: sha256_hex(data),
            storage: BlobStorage::Inline {
                gzip_compressed_data: BASE64.encode(compressed),
            },
            meta,
        })
    }

    /// Build an external record for a payload saved as `filename`.
    pub fn external(
        data: &[u8],
        format: &str,
        filename: &str,
        meta: Option<serde_json::Value>,
    ) -> Self {
        Self {
            length: data.len() as u64,
            format: format.to_owned(),
            sha256: sha256_hex(data),
            storage: BlobStorage::External {
                filename: filename.to_owned(),
            },
            meta,
        }
    }

    /// Decode an inline payload, verifying length and digest.
    pub fn load_inline(&self) -> Result<Vec<u8>, CaptureError> {
        let encoded = match &self.storage {
            BlobStorage::Inline {
                gzip_compressed_data,
            } => gzip_compressed_data,
            BlobStorage::External { filename } => {
                return Err(CaptureError::ExternalStorage {
                    filename: filename.clone(),
                })
            }
        };
        let compressed = BASE64.decode(encoded)?;
        let mut data = Vec::new();
        GzDecoder::new(compressed.as_slice()).read_to_end(&mut data)?;
        self.verify(&data)?;
        Ok(data)
    }

    /// Verify an already-loaded payload against the record.
    ///
    /// Used for externally stored blobs after reading their file.
    pub fn verify(&self, data: &[u8]) -> Result<(), CaptureError> {
        if data.len() as u64 != self.length {
            return Err(CaptureError::LengthMismatch {
                recorded: self.length,
                actual: data.len() as u64,
            });
        }
        let actual = sha256_hex(data);
        if actual != self.sha256 {
            return Err(CaptureError::ChecksumMismatch {
                recorded: self.sha256.clone(),
                actual,
            });
        }
        Ok(())
    }
}

/// A capture session document: provenance plus named blobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureFile {
    /// Capture time, seconds since the Unix epoch.
    pub created: u64,
    /// Address the capture was taken from.
    pub connection: String,
    /// Identity of the instrument, when it was queried.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument: Option<Identity>,
    /// Named blobs, serialized in stable key order.
    pub data: BTreeMap<String, BlobRecord>,
}

impl CaptureFile {
    /// Start an empty capture for the given connection address.
    pub fn new(connection: &str) -> Self {
        let created = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            created,
            connection: connection.to_owned(),
            instrument: None,
            data: BTreeMap::new(),
        }
    }

    /// Record the instrument identity.
    pub fn set_instrument(&mut self, identity: Identity) {
        self.instrument = Some(identity);
    }

    /// Add a named blob.
    pub fn add_blob(&mut self, name: &str, record: BlobRecord) {
        self.data.insert(name.to_owned(), record);
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String, CaptureError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a capture document.
    pub fn from_json(text: &str) -> Result<Self, CaptureError> {
        Ok(serde_json::from_str(text)?)
    }
}
