// ABOUTME: Shared logging setup for keyfleet binaries
// ABOUTME: init() logs to stderr, init_file() appends to a log file under the config dir

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Logging to stderr. Default: INFO, `RUST_LOG` overrides.
pub fn init() {
    init_with_level(Level::INFO);
}

/// Logging to stderr at `level` unless `RUST_LOG` says otherwise.
/// Only the first call in a process installs a subscriber.
pub fn init_with_level(level: Level) {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter(level))
        .try_init();
}

/// File logging. Default: WARN, `RUST_LOG` overrides.
/// Appends to `<config dir>/keyfleet/{app_name}.log`. If setup fails, prints
/// a warning to stderr and continues without logging.
pub fn init_file(app_name: &str) {
    let result = log_path(app_name).and_then(|path| init_file_at(&path));
    if let Err(e) = result {
        eprintln!("Warning: failed to set up file logging: {e}");
    }
}

/// Where [`init_file`] writes for `app_name`.
pub fn log_path(app_name: &str) -> Result<PathBuf, BoxError> {
    let config_dir = dirs::config_dir().ok_or("could not determine config directory")?;
    Ok(config_dir.join("keyfleet").join(format!("{app_name}.log")))
}

fn init_file_at(path: &Path) -> Result<(), BoxError> {
    let log_file = open_log(path)?;
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(filter(Level::WARN))
        .with_ansi(false)
        .try_init()?;
    Ok(())
}

fn open_log(path: &Path) -> std::io::Result<std::fs::File> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

fn filter(default: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(default.into())
        .from_env_lossy()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exports_init() {
        let _ = super::init as fn();
    }

    #[test]
    fn exports_init_file() {
        let _ = super::init_file as fn(&str);
    }

    #[test]
    fn test_log_path_is_namespaced() {
        let path = log_path("keyfleet").expect("config dir should resolve");
        assert!(path.ends_with("keyfleet/keyfleet.log"));
    }

    #[test]
    fn test_open_log_creates_parent_and_appends() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let path = dir.path().join("nested").join("app.log");

        {
            use std::io::Write;
            let mut file = open_log(&path).expect("should open log");
            writeln!(file, "first").expect("should write");
        }
        {
            use std::io::Write;
            let mut file = open_log(&path).expect("should reopen log");
            writeln!(file, "second").expect("should write");
        }

        let contents = std::fs::read_to_string(&path).expect("should read log");
        assert_eq!(contents, "first\nsecond\n");
    }

    #[test]
    fn test_init_file_at_creates_log_even_when_subscriber_is_set() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let path = dir.path().join("logs").join("keyfleet.log");

        // Another test may already own the global subscriber.
        init_with_level(Level::INFO);
        let result: Result<(), BoxError> = init_file_at(&path);

        assert!(result.is_err());
        assert!(path.exists());
    }

    #[test]
    fn test_repeated_init_does_not_panic() {
        init_with_level(Level::DEBUG);
        init();
    }
}
