// Debug logging module for Pong404
// Routes tracing output to a file when enabled via --debug, since the terminal belongs to the UI

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use tracing_subscriber::EnvFilter;

/// Filter used when RUST_LOG is not set
const DEFAULT_FILTER: &str = "pong404=debug";

pub fn default_log_path() -> PathBuf {
    std::env::temp_dir().join("pong404-debug.log")
}

/// Initialize debug logging to file
///
/// # Behavior
/// - If enabled=false: returns immediately, no subscriber is installed and every
///   tracing macro is a no-op
/// - If enabled=true: creates/truncates the log file, writes a header, and installs
///   a fmt subscriber writing to it
pub fn init(enabled: bool, path: Option<&Path>) -> io::Result<()> {
    if !enabled {
        return Ok(());
    }

    let path = path.map(Path::to_path_buf).unwrap_or_else(default_log_path);
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&path)?;

    writeln!(file, "=== Pong404 Debug Log ===")?;
    writeln!(file, "Session started: {:?}", SystemTime::now())?;
    writeln!(file, "To monitor: tail -f {}", path.display())?;
    writeln!(file, "========================================\n")?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_thread_names(true)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
}
