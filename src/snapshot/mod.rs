//! Snapshot save/restore for the cluster's store
//!
//! Save streams a point-in-time snapshot out of the live store. Restore
//! materializes a snapshot into a staging directory first and only replaces
//! the live data directory once the tool has fully succeeded, so a failed
//! restore leaves the cluster exactly as it found it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::{ClusterConfig, ConfigError, Platform};
use crate::runtime::{
    BinaryProvisioner, CommandRunner, ComponentLifecycle, DiagnosticSink, ExecError, ExecRunner,
    HttpProvisioner, IoStreams, ProvisionError, ProvisionRequest, TracingDiagnostics,
    ETCD_COMPONENT,
};

/// Suffix of the staging directory used as the restore target
const STAGING_SUFFIX: &str = "-tmp";

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Provision(#[from] ProvisionError),
    #[error(transparent)]
    Tool(#[from] ExecError),
    #[error("Failed to replace live data directory {live_dir}: {source}")]
    Swap {
        live_dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Orchestrates snapshot save and restore for one cluster
///
/// Collaborators are trait objects so tests can swap in mocks; production
/// wiring comes from [`SnapshotCoordinator::new`] and the `with_*` builders.
pub struct SnapshotCoordinator {
    workdir: PathBuf,
    platform: Platform,
    provisioner: Arc<dyn BinaryProvisioner>,
    lifecycle: Arc<dyn ComponentLifecycle>,
    runner: Arc<dyn CommandRunner>,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl SnapshotCoordinator {
    pub fn new(workdir: PathBuf, platform: Platform, lifecycle: Arc<dyn ComponentLifecycle>) -> Self {
        Self {
            workdir,
            platform,
            lifecycle,
            provisioner: Arc::new(HttpProvisioner::new()),
            runner: Arc::new(ExecRunner),
            diagnostics: Arc::new(TracingDiagnostics),
        }
    }

    pub fn with_provisioner(mut self, provisioner: Arc<dyn BinaryProvisioner>) -> Self {
        self.provisioner = provisioner;
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Write a snapshot of the live store to `dest`.
    ///
    /// The store keeps running; the snapshot is taken over its client API
    /// and is consistent on its own. The parent directory of `dest` must
    /// already exist.
    pub async fn save(&self, ctx: &CancellationToken, dest: &Path) -> Result<(), SnapshotError> {
        let conf = ClusterConfig::load(&self.workdir)?;
        let etcdctl = self.ensure_etcdctl(ctx, &conf).await?;

        let args = vec![
            "snapshot".to_string(),
            "save".to_string(),
            dest.display().to_string(),
            format!("--endpoints=127.0.0.1:{}", conf.etcd_port),
        ];
        self.runner
            .run(ctx, None, IoStreams::default(), &etcdctl, &args)
            .await?;
        Ok(())
    }

    /// Replace the live store data with the snapshot at `source`.
    ///
    /// The store is stopped best-effort around the swap and restarted on
    /// every exit path; a stop or start failure is reported through the
    /// diagnostic sink, never through the returned error.
    pub async fn restore(&self, ctx: &CancellationToken, source: &Path) -> Result<(), SnapshotError> {
        let conf = ClusterConfig::load(&self.workdir)?;
        let etcdctl = self.ensure_etcdctl(ctx, &conf).await?;

        if let Err(err) = self.lifecycle.stop(ctx, ETCD_COMPONENT).await {
            self.diagnostics.error("Failed to stop etcd", &err);
        }

        // The store is paused from here on. Every path below, success or
        // failure, must fall through to the start call exactly once.
        let result = self.stage_and_swap(ctx, &conf, &etcdctl, source).await;

        if let Err(err) = self.lifecycle.start(ctx, ETCD_COMPONENT).await {
            self.diagnostics.error("Failed to start etcd", &err);
        }

        result
    }

    /// Restore into staging, then swap staging over the live directory.
    ///
    /// The live directory is only touched after the tool has fully
    /// succeeded; until then any failure leaves it byte-for-byte intact.
    async fn stage_and_swap(
        &self,
        ctx: &CancellationToken,
        conf: &ClusterConfig,
        etcdctl: &Path,
        source: &Path,
    ) -> Result<(), SnapshotError> {
        let staging = self
            .workdir
            .join(format!("{}{}", conf.data_dir, STAGING_SUFFIX));

        // Leftover from an earlier failed restore; the tool refuses to
        // restore into an existing directory.
        let _ = fs::remove_dir_all(&staging);

        let args = vec![
            "snapshot".to_string(),
            "restore".to_string(),
            source.display().to_string(),
            "--data-dir".to_string(),
            staging.display().to_string(),
        ];
        self.runner
            .run(ctx, None, IoStreams::default(), etcdctl, &args)
            .await?;

        let live = self.workdir.join(&conf.data_dir);
        if live.exists() {
            fs::remove_dir_all(&live).map_err(|source| SnapshotError::Swap {
                live_dir: live.clone(),
                source,
            })?;
        }
        fs::rename(&staging, &live).map_err(|source| {
            // The live directory is already gone at this point; nothing is
            // serving the store's data until someone intervenes.
            tracing::error!(
                live = %live.display(),
                staging = %staging.display(),
                "Restored data could not be moved into place; no live data directory remains"
            );
            SnapshotError::Swap {
                live_dir: live.clone(),
                source,
            }
        })?;

        Ok(())
    }

    async fn ensure_etcdctl(
        &self,
        ctx: &CancellationToken,
        conf: &ClusterConfig,
    ) -> Result<PathBuf, SnapshotError> {
        let asset_name = self.platform.binary_name("etcdctl");
        let dest = self.workdir.join("bin").join(&asset_name);

        let req = ProvisionRequest {
            cache_dir: conf.cache_dir.clone(),
            archive: conf.etcd_binary.clone(),
            dest: dest.clone(),
            asset_name,
            mode: 0o755,
            quiet: conf.quiet_pull,
            extract: true,
        };
        self.provisioner.ensure_binary(ctx, &req).await?;
        Ok(dest)
    }
}
