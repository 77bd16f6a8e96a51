//! Decoherence: classify every blob as real, decoy or noise.
//!
//! Each blob is attempted independently on the blocking pool. All attempts
//! run to completion so the report always covers every blob.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use super::engine::open_real_blob;
use super::{BlobKeys, DustError};
use crate::crypto::{aead_decrypt, sha256};
use crate::payload::DecodedFile;

/// Classification of a single blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlobStatus {
    RealPayload,
    DecoyPayload,
    Failure,
}

impl fmt::Display for BlobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BlobStatus::RealPayload => "REAL_PAYLOAD",
            BlobStatus::DecoyPayload => "DECOY_PAYLOAD",
            BlobStatus::Failure => "FAILURE",
        })
    }
}

/// Which key opened a blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum KeyUsed {
    Alpha,
    Decoy,
    None,
}

/// One line of the decoherence report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlobReport {
    pub index: usize,
    /// First 8 hex digits of SHA-256 over the transmitted blob bytes.
    pub short_hash: String,
    pub size: usize,
    pub status: BlobStatus,
    pub key_used: KeyUsed,
    /// Decoy text recovered with the decoy key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decoy_text: Option<String>,
}

/// Per-blob classification of a payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecoherenceReport {
    pub blobs: Vec<BlobReport>,
}

impl DecoherenceReport {
    pub fn count(&self, status: BlobStatus) -> usize {
        self.blobs.iter().filter(|b| b.status == status).count()
    }

    pub fn real_found(&self) -> bool {
        self.count(BlobStatus::RealPayload) > 0
    }
}

impl fmt::Display for DecoherenceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for blob in &self.blobs {
            writeln!(
                f,
                "  #{:<3} {}  {:>8} bytes  {:<13} key: {:?}",
                blob.index, blob.short_hash, blob.size, blob.status, blob.key_used
            )?;
        }
        Ok(())
    }
}

/// Outcome of decoherence: the report plus the recovered file, if any.
#[derive(Debug, Clone)]
pub struct Decohered {
    pub report: DecoherenceReport,
    pub file: Option<DecodedFile>,
}

/// Uppercase hex of the first four digest bytes.
pub fn short_hash(blob: &[u8]) -> String {
    hex::encode_upper(&sha256(blob)[..4])
}

/// Decoy text must look like prose to count as a decoy.
fn is_plausible_text(text: &str) -> bool {
    text.chars().count() > 10 && text.contains(' ')
}

fn classify(index: usize, transmitted_hash: String, blob: &[u8], keys: &BlobKeys) -> (BlobReport, Option<DecodedFile>) {
    let mut report = BlobReport {
        index,
        short_hash: transmitted_hash,
        size: blob.len(),
        status: BlobStatus::Failure,
        key_used: KeyUsed::None,
        decoy_text: None,
    };

    if let Ok(file) = open_real_blob(blob, keys) {
        report.status = BlobStatus::RealPayload;
        report.key_used = KeyUsed::Alpha;
        return (report, Some(file));
    }

    if let Some(decoy_key) = &keys.decoy {
        let text = aead_decrypt(decoy_key.as_bytes(), blob, None)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .filter(|text| is_plausible_text(text));
        if let Some(text) = text {
            report.status = BlobStatus::DecoyPayload;
            report.key_used = KeyUsed::Decoy;
            report.decoy_text = Some(text);
        }
    }

    (report, None)
}

/// Classifies every unveiled blob.
///
/// `hashes[i]` is the short hash of blob `i` as transmitted (before unveiling).
/// Never short-circuits; the caller decides whether a missing real payload
/// is fatal.
pub async fn decohere(
    blobs: Vec<Vec<u8>>,
    hashes: Vec<String>,
    keys: &BlobKeys,
) -> Result<Decohered, DustError> {
    let keys = Arc::new(keys.clone());

    let attempts = blobs.into_iter().zip(hashes).enumerate().map(|(index, (blob, hash))| {
        let keys = Arc::clone(&keys);
        tokio::task::spawn_blocking(move || classify(index, hash, &blob, &keys))
    });

    let mut report = DecoherenceReport::default();
    let mut file = None;
    for outcome in futures::future::join_all(attempts).await {
        let (entry, recovered) = outcome?;
        if file.is_none() {
            file = recovered;
        }
        debug!(index = entry.index, hash = %entry.short_hash, status = %entry.status, "classified blob");
        report.blobs.push(entry);
    }

    info!(
        blobs = report.blobs.len(),
        real = report.count(BlobStatus::RealPayload),
        decoy = report.count(BlobStatus::DecoyPayload),
        "decoherence complete"
    );

    Ok(Decohered { report, file })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::aead_encrypt;
    use crate::dust::seal_real_blob;
    use crate::keys::SecretKey;
    use crate::payload::prepare;

    fn keys() -> BlobKeys {
        BlobKeys {
            alpha: SecretKey::from_bytes([1u8; 32]),
            omega: None,
            decoy: Some(SecretKey::from_bytes([3u8; 32])),
            block_permutation: false,
        }
    }

    fn hashes(blobs: &[Vec<u8>]) -> Vec<String> {
        blobs.iter().map(|b| short_hash(b)).collect()
    }

    #[test]
    fn test_short_hash_format() {
        let hash = short_hash(b"abc");
        assert_eq!(hash, "BA7816BF");
    }

    #[test]
    fn test_plausibility_heuristic() {
        assert!(is_plausible_text("a plausible sentence"));
        assert!(!is_plausible_text("short text"));
        assert!(!is_plausible_text("nospacesinthislongword"));
    }

    #[tokio::test]
    async fn test_classifies_each_kind() {
        let k = keys();
        let prepared = prepare(b"real", "r.txt", "text/plain", false).unwrap();
        let blobs = vec![
            aead_encrypt(&[9u8; 32], b"noise decoy that nobody can open", None).unwrap(),
            seal_real_blob(&prepared, &k).unwrap(),
            aead_encrypt(k.decoy.as_ref().unwrap().as_bytes(), b"Grocery list: milk and eggs", None).unwrap(),
        ];

        let result = decohere(blobs.clone(), hashes(&blobs), &k).await.unwrap();
        let statuses: Vec<BlobStatus> = result.report.blobs.iter().map(|b| b.status).collect();

        assert_eq!(
            statuses,
            vec![BlobStatus::Failure, BlobStatus::RealPayload, BlobStatus::DecoyPayload]
        );
        assert_eq!(result.file.unwrap().data, b"real");
        assert_eq!(
            result.report.blobs[2].decoy_text.as_deref(),
            Some("Grocery list: milk and eggs")
        );
    }

    #[tokio::test]
    async fn test_implausible_decoy_is_failure() {
        let k = keys();
        let blobs = vec![aead_encrypt(k.decoy.as_ref().unwrap().as_bytes(), b"tiny", None).unwrap()];
        let result = decohere(blobs.clone(), hashes(&blobs), &k).await.unwrap();
        assert_eq!(result.report.blobs[0].status, BlobStatus::Failure);
        assert!(!result.report.real_found());
    }

    #[tokio::test]
    async fn test_tampered_real_blob_fails() {
        let k = keys();
        let prepared = prepare(b"real", "r.txt", "text/plain", false).unwrap();
        let mut blob = seal_real_blob(&prepared, &k).unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0x80;

        let blobs = vec![blob];
        let result = decohere(blobs.clone(), hashes(&blobs), &k).await.unwrap();
        assert_eq!(result.report.blobs[0].status, BlobStatus::Failure);
        assert!(result.file.is_none());
    }
}
