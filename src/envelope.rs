//! The secure envelope: `seal = encrypt ∘ compress`, `open = decompress ∘ decrypt`.
//!
//! Compression and authenticated encryption are themselves out of scope
//! (`spec.md` §1 treats them as opaque byte-to-byte transforms); this module
//! owns one concrete pairing so the rest of the crate is runnable and
//! testable end to end, the same way `kona-derive`'s `ChannelReader` ships a
//! concrete zlib/brotli decoder behind an abstract channel-data source.

use crate::errors::EnvelopeError;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use rand::RngCore;
use std::io::{Read, Write};
use tracing::{debug, warn};

/// Zlib deflate compression method tag, matching the low nibble convention
/// `kona-derive`'s `BatchReader` peeks off the front of channel data.
const ZLIB_DEFLATE_TAG: u8 = 0x08;

const NONCE_LEN: usize = 12;

/// `seal`/`open` over opaque byte blobs.
pub trait SecureEnvelope {
    /// `encrypt(compress(plaintext))`.
    fn seal(&self, plaintext: &[u8]) -> Vec<u8>;
    /// `decompress(decrypt(blob))`.
    fn open(&self, blob: &[u8]) -> Result<Vec<u8>, EnvelopeError>;
}

/// AES-256-GCM authenticated encryption over a zlib-compressed plaintext.
///
/// Wire layout of a sealed blob: `[12-byte nonce][ciphertext, AEAD tag
/// appended by `aes-gcm`]`. The plaintext under the ciphertext is itself
/// `[0x08][zlib deflate stream]`, tagged the same way `kona-derive` tags its
/// channel data so `open` can reject an unrecognized compression format as
/// [`EnvelopeError::CompressionFailure`] instead of misinterpreting bytes.
#[derive(Clone)]
pub struct AesGcmZlibEnvelope {
    key: [u8; 32],
}

impl std::fmt::Debug for AesGcmZlibEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesGcmZlibEnvelope").finish_non_exhaustive()
    }
}

impl AesGcmZlibEnvelope {
    /// Builds an envelope over a 256-bit shared key held by all enclaves.
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key))
    }
}

impl SecureEnvelope for AesGcmZlibEnvelope {
    fn seal(&self, plaintext: &[u8]) -> Vec<u8> {
        let mut compressed = vec![ZLIB_DEFLATE_TAG];
        let mut encoder = ZlibEncoder::new(&mut compressed, Compression::default());
        encoder.write_all(plaintext).expect("in-memory writer cannot fail");
        drop(encoder);

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher()
            .encrypt(nonce, compressed.as_ref())
            .expect("AES-256-GCM encryption over an in-memory buffer cannot fail");

        debug!(target: "envelope", plaintext_len = plaintext.len(), sealed_len = ciphertext.len() + NONCE_LEN, "sealed blob");

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        out
    }

    fn open(&self, blob: &[u8]) -> Result<Vec<u8>, EnvelopeError> {
        if blob.len() < NONCE_LEN {
            warn!(target: "envelope", "sealed blob shorter than a nonce");
            return Err(EnvelopeError::AuthFailure);
        }
        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let compressed = self.cipher().decrypt(nonce, ciphertext).map_err(|_| {
            warn!(target: "envelope", "AEAD tag verification failed");
            EnvelopeError::AuthFailure
        })?;

        let (tag, body) = compressed
            .split_first()
            .ok_or_else(|| EnvelopeError::CompressionFailure("empty compressed payload".into()))?;

        match *tag {
            ZLIB_DEFLATE_TAG => {
                let mut decoder = ZlibDecoder::new(body);
                let mut plaintext = Vec::new();
                decoder
                    .read_to_end(&mut plaintext)
                    .map_err(|e| EnvelopeError::CompressionFailure(e.to_string()))?;
                Ok(plaintext)
            }
            other => {
                warn!(target: "envelope", tag = other, "unsupported compression tag");
                Err(EnvelopeError::CompressionFailure(format!(
                    "unsupported compression tag: {other:#x}"
                )))
            }
        }
    }
}
