// ABOUTME: authorized_keys line encoding and parsing.
// ABOUTME: Lines compare by (key type, key blob); comments never take part in identity.

use super::check_comment;
use crate::error::FormatError;
use ssh_key::{Algorithm, EcdsaCurve, PublicKey};
use std::fmt;

/// Key-type token for an algorithm family that may appear in authorized_keys.
///
/// # Errors
/// Returns `FormatError::UnsupportedKeyType` for security-key and unknown algorithms.
pub fn key_type_token(algorithm: &Algorithm) -> Result<&'static str, FormatError> {
    match algorithm {
        Algorithm::Rsa { .. } => Ok("ssh-rsa"),
        Algorithm::Ed25519 => Ok("ssh-ed25519"),
        Algorithm::Dsa => Ok("ssh-dss"),
        Algorithm::Ecdsa { curve } => Ok(match curve {
            EcdsaCurve::NistP256 => "ecdsa-sha2-nistp256",
            EcdsaCurve::NistP384 => "ecdsa-sha2-nistp384",
            EcdsaCurve::NistP521 => "ecdsa-sha2-nistp521",
        }),
        other => Err(FormatError::UnsupportedKeyType(other.to_string())),
    }
}

/// Encode `"<key-type> <base64-payload> <comment>"`.
///
/// The comment on `public_key` itself is ignored; `comment` is what gets
/// appended. An empty comment yields a two-field line. The result carries no
/// trailing newline and is byte-identical every time it is derived.
///
/// # Errors
/// Returns `FormatError::UnsupportedKeyType` for algorithms without a
/// supported token and `FormatError::InvalidComment` for multi-line comments.
pub fn encode_authorized_key(public_key: &PublicKey, comment: &str) -> Result<String, FormatError> {
    check_comment(comment)?;
    let token = key_type_token(&public_key.algorithm())?;

    let bare = PublicKey::from(public_key.key_data().clone());
    let encoded = bare.to_openssh()?;
    let base = encoded.trim_end_matches(['\r', '\n']);
    debug_assert!(base.starts_with(token));

    if comment.is_empty() {
        Ok(base.to_string())
    } else {
        Ok(format!("{base} {comment}"))
    }
}

/// A parsed, validated authorized-key line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedKey {
    key_type: String,
    key_blob: String,
    comment: String,
}

impl AuthorizedKey {
    /// Parse `"<key-type> <base64-payload> [comment]"`.
    ///
    /// The payload must decode to a key whose embedded algorithm matches the
    /// key-type token.
    ///
    /// # Errors
    /// Returns `FormatError::MalformedAuthorizedKey` for empty or truncated
    /// lines, `FormatError::UnsupportedKeyType` for unsupported algorithms and
    /// `FormatError::InvalidComment` when more than one line is given.
    pub fn parse(line: &str) -> Result<Self, FormatError> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Err(FormatError::MalformedAuthorizedKey(
                "public key is empty".to_string(),
            ));
        }

        let (key_type, rest) = trimmed
            .split_once(char::is_whitespace)
            .unwrap_or((trimmed, ""));
        let rest = rest.trim_start();
        let (key_blob, comment) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        let comment = comment.trim();
        check_comment(comment)?;

        if key_blob.is_empty() {
            return Err(FormatError::MalformedAuthorizedKey(format!(
                "expected '<key-type> <base64>', got {trimmed:?}"
            )));
        }

        let decoded = PublicKey::from_openssh(&format!("{key_type} {key_blob}")).map_err(|e| {
            FormatError::MalformedAuthorizedKey(format!("invalid {key_type} payload: {e}"))
        })?;
        let token = key_type_token(&decoded.algorithm())?;
        if token != key_type {
            return Err(FormatError::UnsupportedKeyType(key_type.to_string()));
        }

        Ok(Self {
            key_type: key_type.to_string(),
            key_blob: key_blob.to_string(),
            comment: comment.to_string(),
        })
    }

    /// Key-type token, e.g. `ssh-rsa`.
    pub fn key_type(&self) -> &str {
        &self.key_type
    }

    /// Base64 key payload.
    pub fn key_blob(&self) -> &str {
        &self.key_blob
    }

    /// Trailing comment, possibly empty.
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Whether both lines name the same key, ignoring comments.
    pub fn same_key(&self, other: &AuthorizedKey) -> bool {
        self.key_type == other.key_type && self.key_blob == other.key_blob
    }

    /// Decode into an ssh-key public key carrying this line's comment.
    ///
    /// # Errors
    /// Returns `FormatError::Ssh` if the payload no longer decodes.
    pub fn public_key(&self) -> Result<PublicKey, FormatError> {
        let mut key = PublicKey::from_openssh(&format!("{} {}", self.key_type, self.key_blob))?;
        key.set_comment(self.comment.clone());
        Ok(key)
    }
}

impl fmt::Display for AuthorizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.comment.is_empty() {
            write!(f, "{} {}", self.key_type, self.key_blob)
        } else {
            write!(f, "{} {} {}", self.key_type, self.key_blob, self.comment)
        }
    }
}

impl std::str::FromStr for AuthorizedKey {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssh_key::PrivateKey;

    fn ed25519_public() -> PublicKey {
        PrivateKey::random(&mut rand::thread_rng(), Algorithm::Ed25519)
            .expect("should generate ed25519 key")
            .public_key()
            .clone()
    }

    #[test]
    fn test_encode_ed25519_line() {
        let key = ed25519_public();
        let line = encode_authorized_key(&key, "alice@laptop").unwrap();

        assert!(line.starts_with("ssh-ed25519 AAAA"));
        assert!(line.ends_with(" alice@laptop"));
        assert!(!line.ends_with('\n'));
        assert_eq!(line.split(' ').count(), 3);
    }

    #[test]
    fn test_encode_replaces_existing_comment() {
        let mut key = ed25519_public();
        key.set_comment("old-comment");
        let line = encode_authorized_key(&key, "new-comment").unwrap();

        assert!(!line.contains("old-comment"));
        assert!(line.ends_with(" new-comment"));
    }

    #[test]
    fn test_encode_without_comment() {
        let key = ed25519_public();
        let line = encode_authorized_key(&key, "").unwrap();
        assert_eq!(line.split(' ').count(), 2);
    }

    #[test]
    fn test_encode_is_deterministic() {
        let key = ed25519_public();
        assert_eq!(
            encode_authorized_key(&key, "c").unwrap(),
            encode_authorized_key(&key, "c").unwrap()
        );
    }

    #[test]
    fn test_encode_rejects_multiline_comment() {
        let key = ed25519_public();
        assert!(matches!(
            encode_authorized_key(&key, "a\nssh-rsa AAAA evil"),
            Err(FormatError::InvalidComment(_))
        ));
    }

    #[test]
    fn test_key_type_token_rejects_security_keys() {
        assert!(matches!(
            key_type_token(&Algorithm::SkEd25519),
            Err(FormatError::UnsupportedKeyType(_))
        ));
        assert_eq!(
            key_type_token(&Algorithm::Rsa { hash: None }).unwrap(),
            "ssh-rsa"
        );
    }

    #[test]
    fn test_parse_round_trip() {
        let key = ed25519_public();
        let line = encode_authorized_key(&key, "bob@desk").unwrap();
        let parsed = AuthorizedKey::parse(&format!("{line}\n")).unwrap();

        assert_eq!(parsed.key_type(), "ssh-ed25519");
        assert_eq!(parsed.comment(), "bob@desk");
        assert_eq!(parsed.to_string(), line);
        assert_eq!(parsed.public_key().unwrap().key_data(), key.key_data());
    }

    #[test]
    fn test_parse_keeps_multi_word_comment() {
        let line = encode_authorized_key(&ed25519_public(), "").unwrap();
        let parsed = AuthorizedKey::parse(&format!("{line} Alice Example (work)")).unwrap();
        assert_eq!(parsed.comment(), "Alice Example (work)");
    }

    #[test]
    fn test_same_key_ignores_comment() {
        let key = ed25519_public();
        let a = AuthorizedKey::parse(&encode_authorized_key(&key, "one").unwrap()).unwrap();
        let b = AuthorizedKey::parse(&encode_authorized_key(&key, "two").unwrap()).unwrap();
        let other = AuthorizedKey::parse(&encode_authorized_key(&ed25519_public(), "one").unwrap())
            .unwrap();

        assert!(a.same_key(&b));
        assert!(!a.same_key(&other));
    }

    #[test]
    fn test_parse_rejects_empty_and_truncated() {
        assert!(matches!(
            AuthorizedKey::parse("   "),
            Err(FormatError::MalformedAuthorizedKey(_))
        ));
        assert!(matches!(
            AuthorizedKey::parse("ssh-rsa"),
            Err(FormatError::MalformedAuthorizedKey(_))
        ));
    }

    #[test]
    fn test_parse_rejects_mismatched_type() {
        let line = encode_authorized_key(&ed25519_public(), "").unwrap();
        let blob = line.split(' ').nth(1).unwrap();
        assert!(AuthorizedKey::parse(&format!("ssh-rsa {blob}")).is_err());
    }

    #[test]
    fn test_parse_rejects_embedded_newline() {
        let line = encode_authorized_key(&ed25519_public(), "first").unwrap();
        assert!(matches!(
            AuthorizedKey::parse(&format!("{line}\nssh-rsa AAAA injected")),
            Err(FormatError::InvalidComment(_))
        ));
    }

    #[test]
    fn test_parse_rejects_bad_base64() {
        assert!(matches!(
            AuthorizedKey::parse("ssh-ed25519 !!!notbase64!!!"),
            Err(FormatError::MalformedAuthorizedKey(_))
        ));
    }
}
