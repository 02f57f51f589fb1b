//! Integration tests for the snapshot save flow

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use simctl::runtime::mock::{MockProvisioner, MockRunner};
use simctl::snapshot::SnapshotError;
use tokio_util::sync::CancellationToken;

use super::common::fixtures::{cluster_fixture, coordinator, failing_handler, Mocks, TEST_PORT};

#[tokio::test]
async fn test_save_writes_a_snapshot_file() {
    let (_dir, workdir) = cluster_fixture();
    let dest = workdir.join("snap.db");

    let mut mocks = Mocks::new();
    mocks.runner = Arc::new(MockRunner::with_handler(|_binary, args: &[String]| {
        // args: snapshot save <path> --endpoints=...
        fs::write(PathBuf::from(&args[2]), b"snapshot payload").unwrap();
        Ok(())
    }));

    let ctx = CancellationToken::new();
    coordinator(&workdir, &mocks).save(&ctx, &dest).await.unwrap();

    assert!(dest.exists());
    assert!(!fs::read(&dest).unwrap().is_empty());

    let invocations = mocks.runner.invocations();
    assert_eq!(invocations.len(), 1);
    let (_, args) = &invocations[0];
    assert_eq!(args[0], "snapshot");
    assert_eq!(args[1], "save");
    assert_eq!(args[3], format!("--endpoints=127.0.0.1:{TEST_PORT}"));

    // The store process is never paused for a save
    assert!(mocks.lifecycle.stop_calls().is_empty());
    assert!(mocks.lifecycle.start_calls().is_empty());
}

#[tokio::test]
async fn test_save_surfaces_a_tool_failure_unchanged() {
    let (_dir, workdir) = cluster_fixture();
    let dest = workdir.join("snap.db");

    let mut mocks = Mocks::new();
    mocks.runner = Arc::new(MockRunner::with_handler(failing_handler(1)));

    let ctx = CancellationToken::new();
    let err = coordinator(&workdir, &mocks)
        .save(&ctx, &dest)
        .await
        .unwrap_err();

    assert!(matches!(err, SnapshotError::Tool(_)));
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_save_provisioning_failure_invokes_no_subprocess() {
    let (_dir, workdir) = cluster_fixture();

    let mut mocks = Mocks::new();
    mocks.provisioner = Arc::new(MockProvisioner::new().failing());

    let ctx = CancellationToken::new();
    let err = coordinator(&workdir, &mocks)
        .save(&ctx, Path::new("/tmp/snap.db"))
        .await
        .unwrap_err();

    assert!(matches!(err, SnapshotError::Provision(_)));
    assert!(mocks.runner.invocations().is_empty());
}
