//! Blob sealing and decoy generation.

use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info};

use super::decoys::{gather_decoy_texts, DecoyContentProvider};
use super::{BlobKeys, DustError};
use crate::config::DeniabilityLevel;
use crate::crypto::{
    aead_decrypt, aead_encrypt, apply_block_permutation, reverse_block_permutation, Argon2Cost,
    KdfProfile,
};
use crate::keys::{generate_key, stretch_password};
use crate::payload::{unpack, DecodedFile};

/// Seals a prepared payload: Omega (inner, optional), then Alpha, then the
/// optional keyed permutation.
pub fn seal_real_blob(prepared: &[u8], keys: &BlobKeys) -> Result<Vec<u8>, DustError> {
    let inner = match &keys.omega {
        Some(omega) => aead_encrypt(omega.as_bytes(), prepared, None)?,
        None => prepared.to_vec(),
    };
    let sealed = aead_encrypt(keys.alpha.as_bytes(), &inner, None)?;

    if keys.block_permutation {
        Ok(apply_block_permutation(&sealed, keys.alpha.as_bytes())?)
    } else {
        Ok(sealed)
    }
}

/// Reverses [`seal_real_blob`] and parses the file inside.
pub fn open_real_blob(blob: &[u8], keys: &BlobKeys) -> Result<DecodedFile, DustError> {
    let sealed = if keys.block_permutation {
        reverse_block_permutation(blob, keys.alpha.as_bytes())?
    } else {
        blob.to_vec()
    };
    let inner = aead_decrypt(keys.alpha.as_bytes(), &sealed, None)?;
    let prepared = match &keys.omega {
        Some(omega) => aead_decrypt(omega.as_bytes(), &inner, None)?,
        None => inner,
    };
    Ok(unpack(&prepared)?)
}

/// Seals one decoy text under a fresh random password at `cost`.
async fn seal_throwaway(text: String, cost: Argon2Cost) -> Result<Vec<u8>, DustError> {
    let blob = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, DustError> {
        let key = stretch_password(&generate_key(), cost)?;
        Ok(aead_encrypt(key.as_bytes(), text.as_bytes(), None)?)
    })
    .await??;
    Ok(blob)
}

/// Produces the shuffled blob set: the real blob plus the decoys for `level`.
///
/// If a decoy key is set, exactly one decoy is sealed under it. Every other
/// decoy gets its own random password; at the hardened level one of those is
/// stretched with the tar-pit cost.
pub async fn scatter(
    prepared: &[u8],
    keys: &BlobKeys,
    level: DeniabilityLevel,
    dynamic_decoys: bool,
    profile: &KdfProfile,
    provider: &dyn DecoyContentProvider,
) -> Result<Vec<Vec<u8>>, DustError> {
    let mut blobs = vec![seal_real_blob(prepared, keys)?];

    let mut texts = gather_decoy_texts(provider, level.decoy_count(), dynamic_decoys).await;

    if let Some(decoy_key) = &keys.decoy {
        if !texts.is_empty() {
            let text = texts.remove(OsRng.gen_range(0..texts.len()));
            blobs.push(aead_encrypt(decoy_key.as_bytes(), text.as_bytes(), None)?);
        }
    }

    let tar_pit = if level.uses_tar_pit() && !texts.is_empty() {
        Some(OsRng.gen_range(0..texts.len()))
    } else {
        None
    };

    let throwaway = texts.into_iter().enumerate().map(|(i, text)| {
        let cost = if Some(i) == tar_pit {
            profile.tar_pit
        } else {
            profile.standard
        };
        seal_throwaway(text, cost)
    });
    for blob in futures::future::join_all(throwaway).await {
        blobs.push(blob?);
    }

    blobs.shuffle(&mut OsRng);

    info!(
        blobs = blobs.len(),
        decoy_key = keys.decoy.is_some(),
        tar_pit = tar_pit.is_some(),
        "scattered payload into digital dust"
    );
    debug!(sizes = ?blobs.iter().map(Vec::len).collect::<Vec<_>>(), "blob sizes");

    Ok(blobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dust::StaticDecoyProvider;
    use crate::keys::SecretKey;
    use crate::payload::prepare;

    fn keys(block_permutation: bool, omega: bool) -> BlobKeys {
        BlobKeys {
            alpha: SecretKey::from_bytes([1u8; 32]),
            omega: omega.then(|| SecretKey::from_bytes([2u8; 32])),
            decoy: Some(SecretKey::from_bytes([3u8; 32])),
            block_permutation,
        }
    }

    #[test]
    fn test_real_blob_roundtrip_all_layers() {
        let prepared = prepare(b"file body", "f.txt", "text/plain", false).unwrap();
        for (perm, omega) in [(false, false), (true, false), (false, true), (true, true)] {
            let k = keys(perm, omega);
            let blob = seal_real_blob(&prepared, &k).unwrap();
            let file = open_real_blob(&blob, &k).unwrap();
            assert_eq!(file.data, b"file body");
        }
    }

    #[test]
    fn test_omega_adds_a_layer() {
        let prepared = prepare(b"abc", "a", "text/plain", false).unwrap();
        let single = seal_real_blob(&prepared, &keys(false, false)).unwrap();
        let double = seal_real_blob(&prepared, &keys(false, true)).unwrap();
        assert_eq!(double.len(), single.len() + 28);
    }

    #[test]
    fn test_missing_permutation_fails_closed() {
        let prepared = prepare(b"abc", "a", "text/plain", false).unwrap();
        let blob = seal_real_blob(&prepared, &keys(true, false)).unwrap();
        assert!(open_real_blob(&blob, &keys(false, false)).is_err());
    }

    #[tokio::test]
    async fn test_scatter_blob_counts() {
        let prepared = prepare(b"abc", "a", "text/plain", false).unwrap();
        let profile = KdfProfile::insecure_fast();

        for (level, expected) in [
            (DeniabilityLevel::Minimal, 1),
            (DeniabilityLevel::Standard, 2),
            (DeniabilityLevel::Hardened, 4),
        ] {
            let blobs = scatter(&prepared, &keys(false, false), level, false, &profile, &StaticDecoyProvider)
                .await
                .unwrap();
            assert_eq!(blobs.len(), expected);
        }
    }

    #[tokio::test]
    async fn test_exactly_one_decoy_under_decoy_key() {
        let prepared = prepare(b"abc", "a", "text/plain", false).unwrap();
        let k = keys(false, false);
        let blobs = scatter(
            &prepared,
            &k,
            DeniabilityLevel::Hardened,
            false,
            &KdfProfile::insecure_fast(),
            &StaticDecoyProvider,
        )
        .await
        .unwrap();

        let decoy_key = k.decoy.as_ref().unwrap();
        let opened = blobs
            .iter()
            .filter(|b| aead_decrypt(decoy_key.as_bytes(), b, None).is_ok())
            .count();
        assert_eq!(opened, 1);

        let real = blobs.iter().filter(|b| open_real_blob(b, &k).is_ok()).count();
        assert_eq!(real, 1);
    }
}
