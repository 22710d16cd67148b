// ABOUTME: Strategy seam for producing PPK containers, natively or through puttygen.
// ABOUTME: Every strategy returns a container that has been parsed and MAC-verified.

use super::{check_comment, encode_legacy_container, encode_pem, PpkContainer};
use crate::error::FormatError;
use crate::key::KeyPair;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tracing::{debug, info};

/// Produces the legacy PPK container for a key pair.
pub trait LegacyEncoder: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &'static str;

    /// Encode `key_pair` with `comment` as PPK v2 text.
    fn encode(&self, key_pair: &KeyPair, comment: &str) -> Result<String, FormatError>;
}

/// Built-in PPK v2 writer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativePpkEncoder;

impl LegacyEncoder for NativePpkEncoder {
    fn name(&self) -> &'static str {
        "native"
    }

    fn encode(&self, key_pair: &KeyPair, comment: &str) -> Result<String, FormatError> {
        encode_legacy_container(key_pair, comment)
    }
}

/// Delegates to PuTTY's own `puttygen` binary.
///
/// Asks for format version 2 explicitly and falls back to the tool's default
/// when it predates `--ppk-param` (0.75). The output must parse as v2 either way.
#[derive(Debug, Clone)]
pub struct PuttygenConverter {
    program: PathBuf,
}

impl Default for PuttygenConverter {
    fn default() -> Self {
        Self::new("puttygen")
    }
}

impl PuttygenConverter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Whether `<program> --version` runs successfully.
    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn run(
        &self,
        pem_path: &Path,
        ppk_path: &Path,
        comment: &str,
        pin_version: bool,
    ) -> Result<Output, FormatError> {
        let mut command = Command::new(&self.program);
        command
            .arg(pem_path)
            .arg("-o")
            .arg(ppk_path)
            .args(["-O", "private", "-C", comment])
            .stdin(Stdio::null());
        if pin_version {
            command.args(["--ppk-param", "version=2"]);
        }
        command.output().map_err(|e| {
            FormatError::Converter(format!("could not run {}: {e}", self.program.display()))
        })
    }
}

impl LegacyEncoder for PuttygenConverter {
    fn name(&self) -> &'static str {
        "puttygen"
    }

    fn encode(&self, key_pair: &KeyPair, comment: &str) -> Result<String, FormatError> {
        check_comment(comment)?;

        let scratch = tempfile::tempdir()?;
        let pem_path = scratch.path().join("key.pem");
        let ppk_path = scratch.path().join("key.ppk");
        std::fs::write(&pem_path, encode_pem(key_pair)?)?;

        let mut output = self.run(&pem_path, &ppk_path, comment, true)?;
        if !output.status.success() && rejects_ppk_param(&output.stderr) {
            // Releases before 0.75 lack --ppk-param and write v2 already.
            debug!(program = %self.program.display(), "retrying without --ppk-param");
            output = self.run(&pem_path, &ppk_path, comment, false)?;
        }

        if !output.status.success() {
            return Err(FormatError::Converter(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let text = std::fs::read_to_string(&ppk_path)?;
        let container = PpkContainer::parse(&text)?;
        container.verify()?;
        if container.comment() != comment {
            return Err(FormatError::Converter(format!(
                "converter wrote comment {:?}, expected {comment:?}",
                container.comment()
            )));
        }

        debug!(program = %self.program.display(), "converted key with external tool");
        Ok(text)
    }
}

/// Whether puttygen's stderr says it does not know `--ppk-param`.
fn rejects_ppk_param(stderr: &[u8]) -> bool {
    String::from_utf8_lossy(stderr).contains("ppk-param")
}

/// Use `puttygen` when it is installed, otherwise the native writer.
///
/// Availability is probed once per `encode` call. A converter that is present
/// but fails is reported as an error rather than silently replaced.
#[derive(Debug, Clone, Default)]
pub struct PreferExternal {
    converter: PuttygenConverter,
    native: NativePpkEncoder,
}

impl PreferExternal {
    pub fn new(converter: PuttygenConverter) -> Self {
        Self {
            converter,
            native: NativePpkEncoder,
        }
    }
}

impl LegacyEncoder for PreferExternal {
    fn name(&self) -> &'static str {
        "auto"
    }

    fn encode(&self, key_pair: &KeyPair, comment: &str) -> Result<String, FormatError> {
        if self.converter.is_available() {
            return self.converter.encode(key_pair, comment);
        }
        info!(
            program = %self.converter.program().display(),
            "external converter not found, using native PPK writer"
        );
        self.native.encode(key_pair, comment)
    }
}
