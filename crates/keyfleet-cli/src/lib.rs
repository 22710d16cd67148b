// ABOUTME: CLI library components for the keyfleet binary.
// ABOUTME: Key file output, batch report rendering, and config override handling.

//! # keyfleet-cli
//!
//! Operator command-line interface for keyfleet.
//!
//! ```text
//! keyfleet
//! ├── keygen --out DIR              # Write id_rsa, id_rsa.pub, id_rsa.ppk
//! ├── deploy --key K --targets T    # Install a public key across targets
//! ├── revoke --key K --targets T    # Remove a public key from targets
//! ├── check --host H --login L      # Reachability probe only
//! ├── verify-ppk FILE               # Parse and MAC-check a PPK container
//! └── fingerprint FILE              # SHA-256 fingerprint of a public key
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Generate a 4096-bit key with PuTTY output
//! keyfleet keygen --out ./keys --comment ops@bastion
//!
//! # Push it to every host in targets.toml
//! keyfleet deploy --key ./keys/id_rsa.pub --targets targets.toml
//! ```

pub mod keyfiles;
pub mod report;
pub mod settings;

pub use keyfiles::{read_public_key_line, write_key_files, KeyFiles};
pub use report::{render_batch, render_json};
pub use settings::{load_config, ConverterChoice, Overrides};

/// Version of the keyfleet CLI
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
