// ABOUTME: RSA key provisioning for keyfleet.
// ABOUTME: Generates key pairs and derives authorized-key, PEM and PuTTY PPK artifacts from them.

//! # keyfleet-keys
//!
//! Generates RSA key pairs and encodes them into the three artifacts an
//! operator hands out: the `authorized_keys` line, a PKCS#1 PEM private key,
//! and a PuTTY PPK v2 container with its integrity MAC.
//!
//! ## Example
//!
//! ```no_run
//! use keyfleet_keys::{EncodedKeyMaterial, KeyPair, NativePpkEncoder, DEFAULT_KEY_BITS};
//!
//! let key_pair = KeyPair::generate(DEFAULT_KEY_BITS, "alice@laptop").expect("key should generate");
//! let material = EncodedKeyMaterial::encode(&key_pair, &NativePpkEncoder).expect("should encode");
//!
//! println!("{}", material.authorized_key());
//! println!("{}", material.fingerprint());
//! ```

mod error;
mod fingerprint;
mod format;
mod key;
mod material;

// Re-export primary types and functions
pub use error::{FormatError, GenerationError};
pub use fingerprint::fingerprint_sha256;
pub use format::{
    encode_authorized_key, encode_legacy_container, encode_pem, key_type_token, AuthorizedKey,
    LegacyEncoder, NativePpkEncoder, PpkContainer, PreferExternal, PuttygenConverter,
    PPK_LINE_WIDTH,
};
pub use key::{
    default_comment, sanitize_comment, KeyPair, DEFAULT_KEY_BITS, FALLBACK_COMMENT, MAX_KEY_BITS,
    MIN_KEY_BITS,
};
pub use material::EncodedKeyMaterial;

// Re-export ssh_key types for convenience
pub use ssh_key::PublicKey;
