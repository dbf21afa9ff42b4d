use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

use crate::manager::{WalManager, WalManagerConfig};
use crate::meta::FileMetaHandler;

/// Initializes a test-scoped tracing subscriber controlled by `RUST_LOG`.
/// Safe to call multiple times — only the first call takes effect.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A manager backed by a real `FileMetaHandler` over a fresh temp
/// directory, with a small unclamped-equivalent buffer size. Returns the
/// `TempDir` too so callers can inspect or reuse the directory (e.g. to
/// build a second manager simulating a restart).
pub fn manager_in(dir: &TempDir, buffer_size: usize) -> WalManager {
    let config = WalManagerConfig {
        mxlog_path: dir.path().to_path_buf(),
        buffer_size,
        recovery_error_ignore: false,
    };
    let meta = Box::new(FileMetaHandler::new(dir.path()));
    WalManager::new_unclamped(config, meta)
}

pub fn new_tmp() -> TempDir {
    TempDir::new().unwrap()
}
