// ABOUTME: Writes generated key material to disk and reads public key files back.
// ABOUTME: Private artifacts are created owner-only (0600) on Unix.

use anyhow::{bail, Context, Result};
use keyfleet_keys::EncodedKeyMaterial;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const PRIVATE_KEY_FILE: &str = "id_rsa";
pub const PUBLIC_KEY_FILE: &str = "id_rsa.pub";
pub const PPK_FILE: &str = "id_rsa.ppk";

/// Paths written by [`write_key_files`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFiles {
    pub private_key: PathBuf,
    pub public_key: PathBuf,
    pub legacy_container: PathBuf,
}

impl KeyFiles {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            private_key: dir.join(PRIVATE_KEY_FILE),
            public_key: dir.join(PUBLIC_KEY_FILE),
            legacy_container: dir.join(PPK_FILE),
        }
    }

    fn all(&self) -> [&Path; 3] {
        [&self.private_key, &self.public_key, &self.legacy_container]
    }
}

/// Write the three artifacts into `dir`, creating it if needed.
///
/// Existing files are left alone unless `overwrite` is set; the check runs
/// before anything is written so a refused call leaves the directory as it was.
pub fn write_key_files(
    dir: &Path,
    material: &EncodedKeyMaterial,
    overwrite: bool,
) -> Result<KeyFiles> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let files = KeyFiles::in_dir(dir);
    if !overwrite {
        if let Some(existing) = files.all().into_iter().find(|p| p.exists()) {
            bail!(
                "{} already exists (use --force to overwrite)",
                existing.display()
            );
        }
    }

    write_file(&files.private_key, material.pem(), 0o600)?;
    write_file(
        &files.public_key,
        &format!("{}\n", material.authorized_key()),
        0o644,
    )?;
    write_file(&files.legacy_container, material.legacy_container(), 0o600)?;
    Ok(files)
}

fn write_file(path: &Path, contents: &str, mode: u32) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    let mut file = options
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    file.write_all(contents.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))?;

    // mode() only applies on creation
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
            .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
    }
    Ok(())
}

/// First non-blank, non-comment line of a public key file.
pub fn read_public_key_line(path: &Path) -> Result<String> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read public key from {}", path.display()))?;
    content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .with_context(|| format!("{} contains no public key", path.display()))
}
