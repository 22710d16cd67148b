// ABOUTME: The full set of artifacts derived from one key pair.
// ABOUTME: Built in a single step so the authorized-key line, PEM and PPK can never disagree.

use crate::error::FormatError;
use crate::fingerprint::fingerprint_sha256;
use crate::format::{encode_authorized_key, encode_pem, LegacyEncoder};
use crate::key::KeyPair;
use std::fmt;
use tracing::info;

/// Immutable artifacts for one key pair and comment.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedKeyMaterial {
    authorized_key: String,
    pem: String,
    legacy_container: String,
    fingerprint: String,
    bits: usize,
    comment: String,
}

impl EncodedKeyMaterial {
    /// Derive every artifact from `key_pair`, using its comment.
    ///
    /// Nothing is returned unless all encoders succeed.
    ///
    /// # Errors
    /// Returns the first `FormatError` raised by any encoder.
    pub fn encode(key_pair: &KeyPair, legacy: &dyn LegacyEncoder) -> Result<Self, FormatError> {
        let comment = key_pair.comment();
        let public_key = key_pair.public_key()?;

        let authorized_key = encode_authorized_key(&public_key, comment)?;
        let pem = encode_pem(key_pair)?;
        let legacy_container = legacy.encode(key_pair, comment)?;
        let fingerprint = fingerprint_sha256(&public_key)?;

        info!(
            bits = key_pair.modulus_bits(),
            comment = %comment,
            fingerprint = %fingerprint,
            encoder = legacy.name(),
            "encoded key material"
        );

        Ok(Self {
            authorized_key,
            pem,
            legacy_container,
            fingerprint,
            bits: key_pair.modulus_bits(),
            comment: comment.to_string(),
        })
    }

    pub fn authorized_key(&self) -> &str {
        &self.authorized_key
    }

    pub fn pem(&self) -> &str {
        &self.pem
    }

    pub fn legacy_container(&self) -> &str {
        &self.legacy_container
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn bits(&self) -> usize {
        self.bits
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }
}

impl fmt::Debug for EncodedKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedKeyMaterial")
            .field("authorized_key", &self.authorized_key)
            .field("fingerprint", &self.fingerprint)
            .field("bits", &self.bits)
            .finish_non_exhaustive()
    }
}
