//! Utility modules

pub mod paths;

pub use paths::{cluster_workdir, clusters_dir, default_cache_dir, log_file_path, logs_dir};
