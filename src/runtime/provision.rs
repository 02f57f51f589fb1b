//! Cache-aware provisioning of external binaries
//!
//! Downloads release archives once into a shared cache, then materializes
//! individual executables out of them. Re-running is cheap: an existing
//! destination short-circuits the whole operation.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::ArchiveRef;

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Failed to download {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("IO error while provisioning {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Archive {url} has no entry named {name}")]
    MissingEntry { url: String, name: String },
    #[error("{name} not found in PATH and no archive is configured")]
    NotFound { name: String },
    #[error("Provisioning {name} was cancelled")]
    Cancelled { name: String },
}

fn io_error(path: &Path, source: std::io::Error) -> ProvisionError {
    ProvisionError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Arguments for one provisioning call
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    /// Root of the shared download cache
    pub cache_dir: PathBuf,
    /// Archive to fetch the binary from; an empty URL means "take it from PATH"
    pub archive: ArchiveRef,
    /// Where the executable must end up
    pub dest: PathBuf,
    /// File name of the wanted executable (also the archive entry to extract)
    pub asset_name: String,
    /// Permission bits applied to the result (unix)
    pub mode: u32,
    /// Suppress download progress output
    pub quiet: bool,
    /// Whether the archive must be unpacked or copied as-is
    pub extract: bool,
}

/// Ensures an executable exists at a destination path
#[async_trait]
pub trait BinaryProvisioner: Send + Sync {
    async fn ensure_binary(
        &self,
        ctx: &CancellationToken,
        req: &ProvisionRequest,
    ) -> Result<(), ProvisionError>;
}

/// BinaryProvisioner that downloads release archives over HTTP
pub struct HttpProvisioner {
    client: reqwest::Client,
}

impl HttpProvisioner {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Cache file location for an archive URL: digest prefix plus the
    /// original file name, so the cache stays readable.
    fn cache_path(cache_dir: &Path, url: &str) -> PathBuf {
        let digest = format!("{:x}", Sha256::digest(url.as_bytes()));
        let file_name = url.rsplit('/').next().unwrap_or("archive");
        cache_dir.join(format!("{}-{}", &digest[..16], file_name))
    }

    async fn download(
        &self,
        ctx: &CancellationToken,
        url: &str,
        cache_file: &Path,
        asset_name: &str,
    ) -> Result<(), ProvisionError> {
        let cache_dir = cache_file.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(cache_dir).map_err(|source| io_error(cache_dir, source))?;

        let response = tokio::select! {
            response = self.client.get(url).send() => response,
            _ = ctx.cancelled() => {
                return Err(ProvisionError::Cancelled {
                    name: asset_name.to_string(),
                });
            }
        }
        .and_then(|r| r.error_for_status())
        .map_err(|source| ProvisionError::Http {
            url: url.to_string(),
            source,
        })?;

        // Stream into a temp file in the cache dir, then rename into place;
        // an interrupted download must never leave a partial cache entry.
        let mut tmp = tempfile::NamedTempFile::new_in(cache_dir)
            .map_err(|source| io_error(cache_dir, source))?;

        let mut stream = response.bytes_stream();
        loop {
            let next = tokio::select! {
                chunk = stream.next() => chunk,
                _ = ctx.cancelled() => {
                    return Err(ProvisionError::Cancelled {
                        name: asset_name.to_string(),
                    });
                }
            };
            let Some(chunk) = next else { break };
            let chunk = chunk.map_err(|source| ProvisionError::Http {
                url: url.to_string(),
                source,
            })?;
            tmp.write_all(&chunk)
                .map_err(|source| io_error(tmp.path(), source))?;
        }

        tmp.persist(cache_file)
            .map_err(|e| io_error(cache_file, e.error))?;
        Ok(())
    }

    /// Unpack the single entry named `asset_name` from a .tar.gz archive.
    fn extract_entry(archive: &Path, url: &str, asset_name: &str, dest: &Path) -> Result<(), ProvisionError> {
        let file = fs::File::open(archive).map_err(|source| io_error(archive, source))?;
        let gz = flate2::read::GzDecoder::new(file);
        let mut tar = tar::Archive::new(gz);

        let entries = tar
            .entries()
            .map_err(|source| io_error(archive, source))?;
        for entry in entries {
            let mut entry = entry.map_err(|source| io_error(archive, source))?;
            let matches = entry
                .path()
                .ok()
                .and_then(|p| p.file_name().map(|n| n == std::ffi::OsStr::new(asset_name)))
                .unwrap_or(false);
            if matches {
                entry
                    .unpack(dest)
                    .map_err(|source| io_error(dest, source))?;
                return Ok(());
            }
        }

        Err(ProvisionError::MissingEntry {
            url: url.to_string(),
            name: asset_name.to_string(),
        })
    }

    fn from_path(asset_name: &str, dest: &Path) -> Result<(), ProvisionError> {
        let found = which::which(asset_name).map_err(|_| ProvisionError::NotFound {
            name: asset_name.to_string(),
        })?;
        fs::copy(&found, dest).map_err(|source| io_error(dest, source))?;
        Ok(())
    }
}

impl Default for HttpProvisioner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BinaryProvisioner for HttpProvisioner {
    async fn ensure_binary(
        &self,
        ctx: &CancellationToken,
        req: &ProvisionRequest,
    ) -> Result<(), ProvisionError> {
        if req.dest.exists() {
            return Ok(());
        }

        if let Some(parent) = req.dest.parent() {
            fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
        }

        if req.archive.url.is_empty() {
            Self::from_path(&req.asset_name, &req.dest)?;
        } else {
            let cache_file = Self::cache_path(&req.cache_dir, &req.archive.url);
            if !cache_file.exists() {
                if !req.quiet {
                    tracing::info!(url = %req.archive.url, "Downloading archive");
                }
                self.download(ctx, &req.archive.url, &cache_file, &req.asset_name)
                    .await?;
            }

            if req.extract {
                let url = req.archive.url.clone();
                let asset_name = req.asset_name.clone();
                let dest = req.dest.clone();
                tokio::task::spawn_blocking(move || {
                    Self::extract_entry(&cache_file, &url, &asset_name, &dest)
                })
                .await
                .map_err(|e| io_error(&req.dest, std::io::Error::other(e)))??;
            } else {
                fs::copy(&cache_file, &req.dest).map_err(|source| io_error(&req.dest, source))?;
            }
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&req.dest, fs::Permissions::from_mode(req.mode))
                .map_err(|source| io_error(&req.dest, source))?;
        }

        Ok(())
    }
}
