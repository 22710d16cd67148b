// ABOUTME: SSH public key fingerprint computation.
// ABOUTME: SHA256 over the wire-format key blob, printed the way ssh-keygen -l prints it.

use crate::error::FormatError;
use base64::Engine;
use sha2::{Digest, Sha256};
use ssh_key::PublicKey;

/// Compute the `SHA256:<base64>` fingerprint of a public key.
///
/// The hash covers the SSH wire encoding of the key (algorithm name followed
/// by the algorithm's public parameters); the comment is not included. The
/// base64 has no padding, matching `ssh-keygen -l -E sha256`.
///
/// # Errors
/// Returns `FormatError::Ssh` if the key cannot be serialized.
pub fn fingerprint_sha256(public_key: &PublicKey) -> Result<String, FormatError> {
    let wire_data = public_key.to_bytes()?;

    let mut hasher = Sha256::new();
    hasher.update(&wire_data);
    let hash = hasher.finalize();

    Ok(format!(
        "SHA256:{}",
        base64::engine::general_purpose::STANDARD_NO_PAD.encode(hash)
    ))
}
