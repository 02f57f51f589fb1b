//! Cluster configuration loaded from <workdir>/cluster.toml

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::util::paths::default_cache_dir;

/// Name of the per-cluster configuration file
pub const CONFIG_FILE_NAME: &str = "cluster.toml";

/// Default etcd release to provision when none is configured
const DEFAULT_ETCD_VERSION: &str = "3.5.11";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read cluster config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse cluster config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Host platform descriptor, injected wherever binary names are built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    pub exe_suffix: &'static str,
}

impl Platform {
    /// Descriptor for the platform this process runs on
    pub fn host() -> Self {
        #[cfg(windows)]
        {
            Self { exe_suffix: ".exe" }
        }
        #[cfg(not(windows))]
        {
            Self { exe_suffix: "" }
        }
    }

    /// Executable file name for a logical tool name
    pub fn binary_name(&self, base: &str) -> String {
        format!("{}{}", base, self.exe_suffix)
    }
}

/// Source archive reference for the store binaries
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveRef {
    pub url: String,
    pub version: String,
}

impl Default for ArchiveRef {
    fn default() -> Self {
        let os = std::env::consts::OS;
        let arch = match std::env::consts::ARCH {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            other => other,
        };
        Self {
            url: format!(
                "https://github.com/etcd-io/etcd/releases/download/v{v}/etcd-v{v}-{os}-{arch}.tar.gz",
                v = DEFAULT_ETCD_VERSION,
            ),
            version: DEFAULT_ETCD_VERSION.to_string(),
        }
    }
}

/// Resolved configuration for one cluster instance
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Root for all of the cluster's runtime state
    pub workdir: PathBuf,
    /// Root for downloaded artifacts, shared across clusters
    pub cache_dir: PathBuf,
    /// Where to fetch the store binaries from
    pub etcd_binary: ArchiveRef,
    /// Client port the store listens on
    pub etcd_port: u16,
    /// Suppress download progress output
    pub quiet_pull: bool,
    /// Name of the store's data directory under the workdir
    pub data_dir: String,
}

/// TOML representation of the config file; absent fields fall back to defaults
#[derive(Debug, Clone, Default, Deserialize)]
struct TomlClusterConfig {
    cache_dir: Option<PathBuf>,
    etcd_binary: Option<ArchiveRef>,
    etcd_port: Option<u16>,
    quiet_pull: Option<bool>,
    data_dir: Option<String>,
}

impl ClusterConfig {
    /// Load the configuration for the cluster rooted at `workdir`.
    ///
    /// A missing config file yields the defaults; an unreadable or malformed
    /// file is an error.
    pub fn load(workdir: &Path) -> Result<Self, ConfigError> {
        let path = workdir.join(CONFIG_FILE_NAME);

        let toml_config = if path.exists() {
            let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            toml::from_str::<TomlClusterConfig>(&contents)
                .map_err(|source| ConfigError::Parse { path, source })?
        } else {
            TomlClusterConfig::default()
        };

        Ok(Self {
            workdir: workdir.to_path_buf(),
            cache_dir: toml_config.cache_dir.unwrap_or_else(default_cache_dir),
            etcd_binary: toml_config.etcd_binary.unwrap_or_default(),
            etcd_port: toml_config.etcd_port.unwrap_or(2379),
            quiet_pull: toml_config.quiet_pull.unwrap_or(false),
            data_dir: toml_config.data_dir.unwrap_or_else(|| "etcd".to_string()),
        })
    }
}
