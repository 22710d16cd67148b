// ABOUTME: PuTTY private key file (PPK version 2) encoding, parsing, and MAC verification.
// ABOUTME: Byte layout and HMAC-SHA-1 integrity tag match what puttygen writes for unencrypted keys.

use super::{check_comment, put_string};
use crate::error::FormatError;
use crate::key::KeyPair;
use base64::Engine;
use hmac::{Hmac, Mac};
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{BigUint, RsaPrivateKey};
use sha1::{Digest, Sha1};
use std::fmt;

/// Base64 column width of the public and private sections.
pub const PPK_LINE_WIDTH: usize = 64;

const HEADER: &str = "PuTTY-User-Key-File-2";
const ENCRYPTION_NONE: &str = "none";
const MAC_KEY_PREFIX: &[u8] = b"putty-private-key-file-mac-key";

type HmacSha1 = Hmac<Sha1>;

/// Encode a key pair as an unencrypted PPK v2 document.
///
/// # Errors
/// Returns `FormatError::InvalidComment` for multi-line comments and
/// `FormatError::IncompleteKey` when the key lacks two primes.
pub fn encode_legacy_container(key_pair: &KeyPair, comment: &str) -> Result<String, FormatError> {
    Ok(PpkContainer::from_key_pair(key_pair, comment)?.to_string())
}

/// The fields of a PPK v2 container.
///
/// A container built with [`PpkContainer::seal`] always carries a MAC that
/// matches its fields. A parsed container carries whatever MAC the document
/// declared; call [`PpkContainer::verify`] before trusting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PpkContainer {
    key_type: String,
    encryption: String,
    comment: String,
    public_blob: Vec<u8>,
    private_blob: Vec<u8>,
    mac: String,
}

impl PpkContainer {
    /// Build an unencrypted container and compute its MAC.
    ///
    /// # Errors
    /// Returns `FormatError::InvalidComment` if `comment` contains control characters.
    pub fn seal(
        key_type: &str,
        comment: &str,
        public_blob: Vec<u8>,
        private_blob: Vec<u8>,
    ) -> Result<Self, FormatError> {
        check_comment(comment)?;
        let mut container = Self {
            key_type: key_type.to_string(),
            encryption: ENCRYPTION_NONE.to_string(),
            comment: comment.to_string(),
            public_blob,
            private_blob,
            mac: String::new(),
        };
        container.mac = container.compute_mac()?;
        Ok(container)
    }

    /// Build the container for an RSA key pair.
    ///
    /// # Errors
    /// See [`encode_legacy_container`].
    pub fn from_key_pair(key_pair: &KeyPair, comment: &str) -> Result<Self, FormatError> {
        let public_blob = key_pair.public_key()?.to_bytes()?;
        let private_blob = rsa_private_blob(key_pair.private_key())?;
        Self::seal("ssh-rsa", comment, public_blob, private_blob)
    }

    /// Parse a PPK v2 document without checking its MAC.
    ///
    /// Declared line counts must agree with the lines actually present.
    ///
    /// # Errors
    /// Returns `FormatError::MalformedContainer` describing the first problem found.
    pub fn parse(text: &str) -> Result<Self, FormatError> {
        let mut lines = text.lines().map(|line| line.trim_end_matches('\r'));

        let first = lines.next().unwrap_or_default();
        let key_type = match first.split_once(": ") {
            Some((HEADER, key_type)) => key_type.to_string(),
            Some((other, _)) if other.starts_with("PuTTY-User-Key-File-") => {
                return Err(malformed(format!("unsupported container version {other:?}")));
            }
            _ => return Err(malformed(format!("missing {HEADER} header"))),
        };

        let encryption = header_value(lines.next(), "Encryption")?.to_string();
        if encryption != ENCRYPTION_NONE {
            return Err(malformed(format!(
                "encrypted containers are not supported ({encryption})"
            )));
        }

        let comment = header_value(lines.next(), "Comment")?.to_string();
        let public_blob = read_section(&mut lines, "Public-Lines")?;
        let private_blob = read_section(&mut lines, "Private-Lines")?;
        let mac = header_value(lines.next(), "Private-MAC")?.to_ascii_lowercase();

        if let Some(extra) = lines.find(|line| !line.trim().is_empty()) {
            return Err(malformed(format!("unexpected trailing line {extra:?}")));
        }

        Ok(Self {
            key_type,
            encryption,
            comment,
            public_blob,
            private_blob,
            mac,
        })
    }

    /// Check the declared MAC and that the public blob matches the key type.
    ///
    /// # Errors
    /// Returns `FormatError::MacMismatch` when the tag is stale or forged.
    pub fn verify(&self) -> Result<(), FormatError> {
        let embedded_type = blob_key_type(&self.public_blob)?;
        if embedded_type != self.key_type.as_bytes() {
            return Err(malformed(format!(
                "public blob is {:?}, header says {:?}",
                String::from_utf8_lossy(embedded_type),
                self.key_type
            )));
        }

        let expected = self.compute_mac()?;
        if expected != self.mac {
            return Err(FormatError::MacMismatch {
                expected,
                found: self.mac.clone(),
            });
        }
        Ok(())
    }

    /// HMAC-SHA-1 over the length-prefixed key type, encryption, comment and blobs.
    ///
    /// # Errors
    /// Never fails for the fixed-size unencrypted MAC key; the error path
    /// exists because HMAC construction is fallible in general.
    pub fn compute_mac(&self) -> Result<String, FormatError> {
        let mac_key = Sha1::digest(MAC_KEY_PREFIX);

        let mut data = Vec::with_capacity(
            20 + self.key_type.len()
                + self.encryption.len()
                + self.comment.len()
                + self.public_blob.len()
                + self.private_blob.len(),
        );
        put_string(&mut data, self.key_type.as_bytes());
        put_string(&mut data, self.encryption.as_bytes());
        put_string(&mut data, self.comment.as_bytes());
        put_string(&mut data, &self.public_blob);
        put_string(&mut data, &self.private_blob);

        let mut mac = HmacSha1::new_from_slice(&mac_key)
            .map_err(|e| FormatError::Converter(format!("HMAC key rejected: {e}")))?;
        mac.update(&data);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    pub fn key_type(&self) -> &str {
        &self.key_type
    }

    pub fn encryption(&self) -> &str {
        &self.encryption
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn public_blob(&self) -> &[u8] {
        &self.public_blob
    }

    pub fn private_blob(&self) -> &[u8] {
        &self.private_blob
    }

    pub fn mac(&self) -> &str {
        &self.mac
    }
}

impl fmt::Display for PpkContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let public_lines = wrap_base64(&self.public_blob);
        let private_lines = wrap_base64(&self.private_blob);

        writeln!(f, "{HEADER}: {}", self.key_type)?;
        writeln!(f, "Encryption: {}", self.encryption)?;
        writeln!(f, "Comment: {}", self.comment)?;
        writeln!(f, "Public-Lines: {}", public_lines.len())?;
        for line in &public_lines {
            writeln!(f, "{line}")?;
        }
        writeln!(f, "Private-Lines: {}", private_lines.len())?;
        for line in &private_lines {
            writeln!(f, "{line}")?;
        }
        writeln!(f, "Private-MAC: {}", self.mac)
    }
}

/// Private section layout for `ssh-rsa`: mpint(d), mpint(p), mpint(q), mpint(iqmp).
///
/// `p` is the larger prime and `iqmp = q^-1 mod p`, which is the canonical
/// order PuTTY normalises every RSA key into.
fn rsa_private_blob(key: &RsaPrivateKey) -> Result<Vec<u8>, FormatError> {
    let primes = key.primes();
    if primes.len() != 2 {
        return Err(FormatError::IncompleteKey("expected exactly two primes"));
    }

    // crt_coefficient() is primes[1]^-1 mod primes[0]; rebuild with swapped
    // primes when the smaller one is stored first.
    let (p, q, iqmp) = if primes[0] > primes[1] {
        let iqmp = key
            .crt_coefficient()
            .ok_or(FormatError::IncompleteKey("CRT coefficient"))?;
        (&primes[0], &primes[1], iqmp)
    } else {
        let reordered = RsaPrivateKey::from_components(
            key.n().clone(),
            key.e().clone(),
            key.d().clone(),
            vec![primes[1].clone(), primes[0].clone()],
        )
        .map_err(|_| FormatError::IncompleteKey("primes do not form a valid key"))?;
        let iqmp = reordered
            .crt_coefficient()
            .ok_or(FormatError::IncompleteKey("CRT coefficient"))?;
        (&primes[1], &primes[0], iqmp)
    };

    let mut blob = Vec::new();
    for value in [key.d(), p, q, &iqmp] {
        put_mpint(&mut blob, value)?;
    }
    Ok(blob)
}

fn put_mpint(buf: &mut Vec<u8>, value: &BigUint) -> Result<(), FormatError> {
    let mpint = ssh_key::Mpint::try_from(value)?;
    put_string(buf, mpint.as_bytes());
    Ok(())
}

fn wrap_base64(data: &[u8]) -> Vec<String> {
    let encoded = base64::engine::general_purpose::STANDARD.encode(data);
    encoded
        .as_bytes()
        .chunks(PPK_LINE_WIDTH)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect()
}

fn header_value<'a>(line: Option<&'a str>, name: &str) -> Result<&'a str, FormatError> {
    let line = line.ok_or_else(|| malformed(format!("missing {name} line")))?;
    line.strip_prefix(name)
        .and_then(|rest| rest.strip_prefix(':'))
        .map(|value| value.strip_prefix(' ').unwrap_or(value))
        .ok_or_else(|| malformed(format!("expected {name} line, found {line:?}")))
}

fn read_section<'a>(
    lines: &mut impl Iterator<Item = &'a str>,
    name: &str,
) -> Result<Vec<u8>, FormatError> {
    let declared: usize = header_value(lines.next(), name)?
        .trim()
        .parse()
        .map_err(|_| malformed(format!("{name} is not a number")))?;

    let mut encoded = String::new();
    for index in 0..declared {
        let line = lines.next().ok_or_else(|| {
            malformed(format!("{name} declares {declared} lines, found {index}"))
        })?;
        if line.contains(':') {
            return Err(malformed(format!(
                "{name} declares {declared} lines, found {index} before {line:?}"
            )));
        }
        encoded.push_str(line.trim());
    }

    base64::engine::general_purpose::STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| malformed(format!("{name} section is not valid base64: {e}")))
}

/// Leading SSH string of a public blob, i.e. its algorithm name.
fn blob_key_type(blob: &[u8]) -> Result<&[u8], FormatError> {
    let len_bytes: [u8; 4] = blob
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| malformed("public blob is truncated".to_string()))?;
    let len = u32::from_be_bytes(len_bytes) as usize;
    blob.get(4..4 + len)
        .ok_or_else(|| malformed("public blob is truncated".to_string()))
}

fn malformed(message: String) -> FormatError {
    FormatError::MalformedContainer(message)
}
