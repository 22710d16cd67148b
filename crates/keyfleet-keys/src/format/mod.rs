// ABOUTME: Textual and binary representations derived from a key pair.
// ABOUTME: Authorized-key lines, PKCS#1 PEM, and PuTTY PPK containers behind one encoder seam.

mod authorized;
mod converter;
mod pem;
mod ppk;

pub use authorized::{encode_authorized_key, key_type_token, AuthorizedKey};
pub use converter::{LegacyEncoder, NativePpkEncoder, PreferExternal, PuttygenConverter};
pub use pem::encode_pem;
pub use ppk::{encode_legacy_container, PpkContainer, PPK_LINE_WIDTH};

use crate::error::FormatError;

/// Reject comments that would break a single-line record.
pub(crate) fn check_comment(comment: &str) -> Result<(), FormatError> {
    if comment.chars().any(char::is_control) {
        return Err(FormatError::InvalidComment(comment.to_string()));
    }
    Ok(())
}

/// Append an SSH `string` (u32 big-endian length prefix followed by the bytes).
pub(crate) fn put_string(buf: &mut Vec<u8>, data: &[u8]) {
    buf.extend_from_slice(&(data.len() as u32).to_be_bytes());
    buf.extend_from_slice(data);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_comment_accepts_plain_text() {
        assert!(check_comment("alice@laptop").is_ok());
        assert!(check_comment("").is_ok());
        assert!(check_comment("with spaces and ünïcode").is_ok());
    }

    #[test]
    fn test_check_comment_rejects_newlines() {
        assert!(matches!(
            check_comment("line\nbreak"),
            Err(FormatError::InvalidComment(_))
        ));
        assert!(check_comment("cr\r").is_err());
        assert!(check_comment("tab\t").is_err());
    }

    #[test]
    fn test_put_string_prefixes_length() {
        let mut buf = Vec::new();
        put_string(&mut buf, b"ssh-rsa");
        assert_eq!(&buf[..4], &[0, 0, 0, 7]);
        assert_eq!(&buf[4..], b"ssh-rsa");
    }
}
