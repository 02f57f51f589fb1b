//! Path utilities for simctl cluster directories

use std::path::{Path, PathBuf};

/// Get the base simctl data directory (~/.simctl)
fn base_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".simctl"))
        .unwrap_or_else(|| PathBuf::from(".simctl"))
}

/// Get the directory holding all cluster working directories (~/.simctl/clusters)
pub fn clusters_dir() -> PathBuf {
    base_dir().join("clusters")
}

/// Get the working directory for a named cluster (~/.simctl/clusters/<name>)
pub fn cluster_workdir(name: &str) -> PathBuf {
    clusters_dir().join(name)
}

/// Get the shared download cache directory (~/.simctl/cache)
pub fn default_cache_dir() -> PathBuf {
    base_dir().join("cache")
}

/// Get the logs directory for a cluster (<workdir>/logs)
pub fn logs_dir(workdir: &Path) -> PathBuf {
    workdir.join("logs")
}

/// Get the log file path for a cluster (<workdir>/logs/simctl.log)
pub fn log_file_path(workdir: &Path) -> PathBuf {
    logs_dir(workdir).join("simctl.log")
}
