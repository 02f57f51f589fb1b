use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use simctl::config::{ClusterConfig, Platform};
use simctl::runtime::{ComponentManager, ComponentSpec, ETCD_COMPONENT};
use simctl::snapshot::SnapshotCoordinator;
use simctl::util;

#[derive(Parser)]
#[command(name = "simctl", about = "Cluster runtime controller for simulated clusters")]
struct Cli {
    /// Cluster name; the working directory defaults to ~/.simctl/clusters/<name>
    #[arg(long, default_value = "default")]
    name: String,

    /// Override the cluster working directory
    #[arg(long)]
    workdir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Save or restore a snapshot of the cluster's store
    Snapshot {
        #[command(subcommand)]
        op: SnapshotOp,
    },
}

#[derive(Subcommand)]
enum SnapshotOp {
    /// Write a point-in-time snapshot of the store to a file
    Save { path: PathBuf },
    /// Replace the store's data with a previously saved snapshot
    Restore { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let workdir = cli
        .workdir
        .unwrap_or_else(|| util::paths::cluster_workdir(&cli.name));

    // Log to a file under the cluster workdir (<workdir>/logs/simctl.log)
    fs::create_dir_all(util::paths::logs_dir(&workdir))?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(util::paths::log_file_path(&workdir))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .init();

    // Ctrl-C aborts in-flight subprocess work
    let ctx = CancellationToken::new();
    let cancel = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let lifecycle = Arc::new(ComponentManager::new());
    register_etcd(&lifecycle, &workdir)?;

    let coordinator = SnapshotCoordinator::new(workdir, Platform::host(), lifecycle);

    match cli.command {
        Commands::Snapshot {
            op: SnapshotOp::Save { path },
        } => coordinator.save(&ctx, &path).await?,
        Commands::Snapshot {
            op: SnapshotOp::Restore { path },
        } => coordinator.restore(&ctx, &path).await?,
    }

    Ok(())
}

/// Register the store component so restore can pause and resume it
fn register_etcd(manager: &ComponentManager, workdir: &Path) -> Result<()> {
    let conf = ClusterConfig::load(workdir)?;
    let platform = Platform::host();
    let binary = workdir.join("bin").join(platform.binary_name("etcd"));

    manager.register(
        ETCD_COMPONENT,
        ComponentSpec {
            binary,
            args: vec![
                format!("--data-dir={}", workdir.join(&conf.data_dir).display()),
                format!("--listen-client-urls=http://127.0.0.1:{}", conf.etcd_port),
                format!("--advertise-client-urls=http://127.0.0.1:{}", conf.etcd_port),
            ],
            workdir: Some(workdir.to_path_buf()),
        },
    );
    Ok(())
}
