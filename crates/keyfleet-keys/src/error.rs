// ABOUTME: Error types for key generation and key encoding using thiserror.
// ABOUTME: GenerationError covers entropy and size policy, FormatError covers every encoder.

use thiserror::Error;

/// Errors that can occur while generating a key pair.
#[derive(Error, Debug)]
pub enum GenerationError {
    /// The requested modulus is below the accepted minimum.
    #[error("key size {bits} is too small (minimum {min} bits)")]
    KeySizeTooSmall { bits: usize, min: usize },

    /// The requested modulus is above the accepted maximum.
    #[error("key size {bits} is too large (maximum {max} bits)")]
    KeySizeTooLarge { bits: usize, max: usize },

    /// The operating system entropy source could not be read.
    #[error("entropy source unavailable: {0}")]
    EntropyUnavailable(#[source] rand::Error),

    /// The RSA backend failed to produce or validate a key.
    #[error("failed to generate RSA key: {0}")]
    Rsa(#[source] rsa::Error),
}

/// Errors that can occur while encoding, parsing, or verifying key material.
#[derive(Error, Debug)]
pub enum FormatError {
    /// The key's algorithm has no representation in the requested format.
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    /// The comment cannot be embedded in a single-line record.
    #[error("invalid comment {0:?}: control characters are not allowed")]
    InvalidComment(String),

    /// An authorized-key line could not be parsed.
    #[error("malformed authorized key line: {0}")]
    MalformedAuthorizedKey(String),

    /// The ssh-key backend rejected the key.
    #[error("failed to encode SSH key: {0}")]
    Ssh(#[source] ssh_key::Error),

    /// PKCS#1 serialization or parsing failed.
    #[error("PKCS#1 encoding failed: {0}")]
    Pkcs1(#[source] rsa::pkcs1::Error),

    /// The private key is missing a component the encoding requires.
    #[error("private key is incomplete: {0}")]
    IncompleteKey(&'static str),

    /// A legacy container could not be parsed.
    #[error("malformed PPK container: {0}")]
    MalformedContainer(String),

    /// A legacy container's integrity tag does not match its contents.
    #[error("PPK integrity check failed: expected MAC {expected}, found {found}")]
    MacMismatch { expected: String, found: String },

    /// The external converter could not be run or produced unusable output.
    #[error("external converter failed: {0}")]
    Converter(String),

    /// Scratch files for the external converter could not be managed.
    #[error("converter I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ssh_key::Error> for FormatError {
    fn from(err: ssh_key::Error) -> Self {
        FormatError::Ssh(err)
    }
}

impl From<rsa::pkcs1::Error> for FormatError {
    fn from(err: rsa::pkcs1::Error) -> Self {
        FormatError::Pkcs1(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_size_too_small_display() {
        let err = GenerationError::KeySizeTooSmall {
            bits: 1024,
            min: 2048,
        };
        let display = err.to_string();
        assert!(display.contains("1024"));
        assert!(display.contains("minimum 2048"));
    }

    #[test]
    fn test_key_size_too_large_display() {
        let err = GenerationError::KeySizeTooLarge {
            bits: 16384,
            max: 8192,
        };
        assert!(err.to_string().contains("maximum 8192"));
    }

    #[test]
    fn test_unsupported_key_type_display() {
        let err = FormatError::UnsupportedKeyType("sk-ssh-ed25519@openssh.com".to_string());
        assert!(err.to_string().contains("unsupported key type"));
        assert!(err.to_string().contains("sk-ssh-ed25519"));
    }

    #[test]
    fn test_mac_mismatch_display() {
        let err = FormatError::MacMismatch {
            expected: "aa".to_string(),
            found: "bb".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("expected MAC aa"));
        assert!(display.contains("found bb"));
    }

    #[test]
    fn test_error_source_ssh() {
        use std::error::Error;

        let err = FormatError::from(ssh_key::Error::AlgorithmUnknown);
        assert!(err.source().is_some());
    }

    #[test]
    fn test_error_source_rsa() {
        use std::error::Error;

        let err = GenerationError::Rsa(rsa::Error::InvalidPrime);
        assert!(err.source().is_some());
    }

    #[test]
    fn test_io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: FormatError = io_err.into();
        assert!(matches!(err, FormatError::Io(_)));
    }
}
