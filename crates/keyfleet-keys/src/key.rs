// ABOUTME: RSA key pair generation and reconstruction from persisted PEM.
// ABOUTME: Enforces the modulus size policy and derives owner comments from the login environment.

use crate::error::{FormatError, GenerationError};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPrivateKey};
use std::fmt;
use std::time::Instant;
use tracing::{debug, info};

/// Smallest modulus accepted by [`KeyPair::generate`].
pub const MIN_KEY_BITS: usize = 2048;

/// Largest modulus accepted by [`KeyPair::generate`].
pub const MAX_KEY_BITS: usize = 8192;

/// Recommended modulus size.
pub const DEFAULT_KEY_BITS: usize = 4096;

/// Comment used when nothing can be derived from the environment.
pub const FALLBACK_COMMENT: &str = "keyfleet";

/// An RSA key pair together with its owner comment.
///
/// A `KeyPair` is never edited in place. Regenerating produces a new value,
/// and changing the comment produces a copy via [`KeyPair::with_comment`], so
/// anything derived from a pair can be rebuilt from it as a consistent set.
#[derive(Clone)]
pub struct KeyPair {
    private: RsaPrivateKey,
    comment: String,
}

impl KeyPair {
    /// Generate a fresh RSA key pair with the given modulus size.
    ///
    /// # Errors
    /// Returns `GenerationError::KeySizeTooSmall`/`KeySizeTooLarge` when
    /// `bits` is outside `MIN_KEY_BITS..=MAX_KEY_BITS`, and
    /// `GenerationError::EntropyUnavailable` when the OS RNG cannot be read.
    pub fn generate(bits: usize, comment: impl Into<String>) -> Result<Self, GenerationError> {
        check_key_size(bits)?;

        // OsRng panics on failure inside the RSA backend; probe it first so
        // an unavailable entropy source surfaces as an error instead.
        let mut probe = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut probe)
            .map_err(GenerationError::EntropyUnavailable)?;

        let started = Instant::now();
        let private = RsaPrivateKey::new(&mut OsRng, bits).map_err(GenerationError::Rsa)?;
        private.validate().map_err(GenerationError::Rsa)?;

        let comment = comment.into();
        info!(
            bits,
            comment = %comment,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "generated RSA key pair"
        );

        Ok(Self { private, comment })
    }

    /// Wrap an existing RSA private key.
    pub fn from_private_key(private: RsaPrivateKey, comment: impl Into<String>) -> Self {
        Self {
            private,
            comment: comment.into(),
        }
    }

    /// Rebuild a key pair from a PKCS#1 `RSA PRIVATE KEY` PEM document.
    ///
    /// # Errors
    /// Returns `FormatError::Pkcs1` if the document is not a valid RSA key.
    pub fn from_pkcs1_pem(pem: &str, comment: impl Into<String>) -> Result<Self, FormatError> {
        let private = RsaPrivateKey::from_pkcs1_pem(pem)?;
        debug!(bits = private.n().bits(), "loaded RSA key pair from PEM");
        Ok(Self::from_private_key(private, comment))
    }

    /// Copy of this key pair carrying a different comment.
    pub fn with_comment(&self, comment: impl Into<String>) -> Self {
        Self {
            private: self.private.clone(),
            comment: comment.into(),
        }
    }

    /// Modulus size in bits.
    pub fn modulus_bits(&self) -> usize {
        self.private.n().bits()
    }

    /// Public exponent.
    pub fn public_exponent(&self) -> &BigUint {
        self.private.e()
    }

    /// Owner comment.
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Underlying RSA private key.
    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private
    }

    /// Public half in ssh-key form, carrying this pair's comment.
    ///
    /// # Errors
    /// Returns `FormatError::Ssh` if the modulus cannot be represented.
    pub fn public_key(&self) -> Result<ssh_key::PublicKey, FormatError> {
        let rsa_public = ssh_key::public::RsaPublicKey::try_from(self.private.to_public_key())?;
        Ok(ssh_key::PublicKey::new(
            ssh_key::public::KeyData::Rsa(rsa_public),
            self.comment.clone(),
        ))
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("bits", &self.modulus_bits())
            .field("comment", &self.comment)
            .finish_non_exhaustive()
    }
}

fn check_key_size(bits: usize) -> Result<(), GenerationError> {
    if bits < MIN_KEY_BITS {
        return Err(GenerationError::KeySizeTooSmall {
            bits,
            min: MIN_KEY_BITS,
        });
    }
    if bits > MAX_KEY_BITS {
        return Err(GenerationError::KeySizeTooLarge {
            bits,
            max: MAX_KEY_BITS,
        });
    }
    Ok(())
}

/// Derive an owner comment from the login environment.
///
/// Tries `USER`, `USERNAME` and `LOGNAME`, then the last component of
/// `HOME`, and finally [`FALLBACK_COMMENT`]. The result is sanitized.
pub fn default_comment() -> String {
    let from_env = ["USER", "USERNAME", "LOGNAME"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.trim().is_empty())
        .or_else(|| {
            std::env::var_os("HOME").and_then(|home| {
                std::path::Path::new(&home)
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            })
        });

    match from_env.map(|c| sanitize_comment(&c)) {
        Some(comment) if !comment.is_empty() => comment,
        _ => FALLBACK_COMMENT.to_string(),
    }
}

/// Strip everything but ASCII letters, digits, `-`, `_`, `.`, `@` and space.
pub fn sanitize_comment(comment: &str) -> String {
    comment
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@' | ' '))
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;

    fn shared_key() -> &'static KeyPair {
        static KEY: OnceLock<KeyPair> = OnceLock::new();
        KEY.get_or_init(|| KeyPair::generate(MIN_KEY_BITS, "test@keyfleet").unwrap())
    }

    #[test]
    fn test_rejects_small_modulus() {
        let err = KeyPair::generate(1024, "x").unwrap_err();
        assert!(matches!(
            err,
            GenerationError::KeySizeTooSmall {
                bits: 1024,
                min: 2048
            }
        ));
    }

    #[test]
    fn test_rejects_oversized_modulus() {
        let err = KeyPair::generate(16384, "x").unwrap_err();
        assert!(matches!(err, GenerationError::KeySizeTooLarge { .. }));
    }

    #[test]
    fn test_generated_key_has_requested_size() {
        let key = shared_key();
        assert_eq!(key.modulus_bits(), 2048);
        assert_eq!(key.public_exponent(), &BigUint::from(65537u32));
        assert_eq!(key.comment(), "test@keyfleet");
    }

    #[test]
    fn test_with_comment_keeps_key_material() {
        let key = shared_key();
        let renamed = key.with_comment("other");

        assert_eq!(renamed.comment(), "other");
        assert_eq!(renamed.private_key(), key.private_key());
        assert_eq!(key.comment(), "test@keyfleet");
    }

    #[test]
    fn test_public_key_carries_comment() {
        let public = shared_key().public_key().unwrap();
        assert!(public.key_data().is_rsa());
        assert_eq!(public.comment(), "test@keyfleet");
    }

    #[test]
    fn test_debug_hides_private_material() {
        let debug = format!("{:?}", shared_key());
        assert!(debug.contains("bits: 2048"));
        assert!(!debug.contains("primes"));
    }

    #[test]
    fn test_from_pkcs1_pem_rejects_garbage() {
        let err = KeyPair::from_pkcs1_pem("not a pem", "x").unwrap_err();
        assert!(matches!(err, FormatError::Pkcs1(_)));
    }

    #[test]
    fn test_sanitize_comment() {
        assert_eq!(sanitize_comment("alice@host-1"), "alice@host-1");
        assert_eq!(sanitize_comment("bob\n; rm -rf /"), "bob rm -rf");
        assert_eq!(sanitize_comment("  spaced  "), "spaced");
        assert_eq!(sanitize_comment("한글"), "");
    }

    #[test]
    fn test_default_comment_is_never_empty() {
        let comment = default_comment();
        assert!(!comment.is_empty());
        assert_eq!(comment, sanitize_comment(&comment));
    }
}
