//! Cluster fixtures and mock wiring for integration tests

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use simctl::config::Platform;
use simctl::runtime::mock::{MockDiagnostics, MockLifecycle, MockProvisioner, MockRunner};
use simctl::runtime::ExecError;
use simctl::snapshot::SnapshotCoordinator;
use tempfile::TempDir;

pub const TEST_PORT: u16 = 2399;

/// Mock collaborators for one coordinator under test
pub struct Mocks {
    pub provisioner: Arc<MockProvisioner>,
    pub lifecycle: Arc<MockLifecycle>,
    pub runner: Arc<MockRunner>,
    pub diagnostics: Arc<MockDiagnostics>,
}

impl Mocks {
    pub fn new() -> Self {
        Self {
            provisioner: Arc::new(MockProvisioner::new()),
            lifecycle: Arc::new(MockLifecycle::new()),
            runner: Arc::new(MockRunner::new()),
            diagnostics: Arc::new(MockDiagnostics::new()),
        }
    }
}

/// Create a cluster workdir with a config file and a populated live data
/// directory (one `member/db` file holding `original contents`).
pub fn cluster_fixture() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let workdir = dir.path().to_path_buf();

    fs::write(
        workdir.join("cluster.toml"),
        format!("etcd_port = {TEST_PORT}\nquiet_pull = true\n"),
    )
    .unwrap();

    let live = workdir.join("etcd");
    fs::create_dir_all(live.join("member")).unwrap();
    fs::write(live.join("member").join("db"), b"original contents").unwrap();

    (dir, workdir)
}

/// Wire a coordinator against the given mocks
pub fn coordinator(workdir: &Path, mocks: &Mocks) -> SnapshotCoordinator {
    SnapshotCoordinator::new(
        workdir.to_path_buf(),
        Platform::host(),
        mocks.lifecycle.clone(),
    )
    .with_provisioner(mocks.provisioner.clone())
    .with_runner(mocks.runner.clone())
    .with_diagnostics(mocks.diagnostics.clone())
}

/// Extract the value following `--data-dir` from a tool invocation
pub fn data_dir_arg(args: &[String]) -> Option<PathBuf> {
    args.iter()
        .position(|a| a == "--data-dir")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
}

/// Handler emulating `etcdctl snapshot restore`: creates the `--data-dir`
/// target and writes a marker database file into it.
pub fn restore_handler(
    content: &'static [u8],
) -> impl Fn(&Path, &[String]) -> Result<(), ExecError> + Send + Sync + 'static {
    move |_binary, args| {
        let data_dir = data_dir_arg(args).expect("restore invocation must pass --data-dir");
        fs::create_dir_all(data_dir.join("member")).unwrap();
        fs::write(data_dir.join("member").join("db"), content).unwrap();
        Ok(())
    }
}

/// Handler emulating a tool that exits non-zero without side effects
pub fn failing_handler(code: i32) -> impl Fn(&Path, &[String]) -> Result<(), ExecError> + Send + Sync + 'static {
    move |binary, _args| {
        Err(ExecError::NonZeroExit {
            binary: binary.to_path_buf(),
            code,
        })
    }
}

/// Read the marker database file out of a data directory
pub fn db_contents(data_dir: &Path) -> Vec<u8> {
    fs::read(data_dir.join("member").join("db")).unwrap()
}
