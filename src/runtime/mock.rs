//! Mock collaborators for deterministic testing
//!
//! Implement the runtime traits without touching the network or spawning
//! processes. Each mock captures its calls behind an `Arc<Mutex<…>>` so
//! tests can assert on exactly what the coordinator did, and in what
//! quantity, independently of the returned error.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::runtime::diag::DiagnosticSink;
use crate::runtime::exec::{CommandRunner, ExecError, IoStreams};
use crate::runtime::lifecycle::{ComponentLifecycle, LifecycleError};
use crate::runtime::provision::{BinaryProvisioner, ProvisionError, ProvisionRequest};

/// Mock provisioner that records requests and optionally fails
#[derive(Default)]
pub struct MockProvisioner {
    fail: bool,
    requests: Arc<Mutex<Vec<ProvisionRequest>>>,
}

impl MockProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the mock to fail every call
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Get captured provisioning requests for assertions
    pub fn requests(&self) -> Vec<ProvisionRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl BinaryProvisioner for MockProvisioner {
    async fn ensure_binary(
        &self,
        _ctx: &CancellationToken,
        req: &ProvisionRequest,
    ) -> Result<(), ProvisionError> {
        self.requests.lock().push(req.clone());
        if self.fail {
            return Err(ProvisionError::NotFound {
                name: req.asset_name.clone(),
            });
        }
        Ok(())
    }
}

/// Mock lifecycle that counts stop/start transitions per component
#[derive(Default)]
pub struct MockLifecycle {
    fail_stop: bool,
    fail_start: bool,
    stop_calls: Arc<Mutex<Vec<String>>>,
    start_calls: Arc<Mutex<Vec<String>>>,
}

impl MockLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure stop() to fail
    pub fn failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    /// Configure start() to fail
    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Component names passed to stop(), in call order
    pub fn stop_calls(&self) -> Vec<String> {
        self.stop_calls.lock().clone()
    }

    /// Component names passed to start(), in call order
    pub fn start_calls(&self) -> Vec<String> {
        self.start_calls.lock().clone()
    }
}

#[async_trait]
impl ComponentLifecycle for MockLifecycle {
    async fn start(&self, _ctx: &CancellationToken, name: &str) -> Result<(), LifecycleError> {
        self.start_calls.lock().push(name.to_string());
        if self.fail_start {
            return Err(LifecycleError::Spawn {
                name: name.to_string(),
                source: std::io::Error::other("mock start failure"),
            });
        }
        Ok(())
    }

    async fn stop(&self, _ctx: &CancellationToken, name: &str) -> Result<(), LifecycleError> {
        self.stop_calls.lock().push(name.to_string());
        if self.fail_stop {
            return Err(LifecycleError::NotRunning(name.to_string()));
        }
        Ok(())
    }
}

type RunHandler = dyn Fn(&Path, &[String]) -> Result<(), ExecError> + Send + Sync;

/// Mock command runner with a programmable handler
///
/// The handler sees the binary path and arguments of each invocation, so a
/// test can materialize the side effects a real tool would have (writing a
/// snapshot file, populating a restore target directory).
pub struct MockRunner {
    handler: Arc<RunHandler>,
    invocations: Arc<Mutex<Vec<(PathBuf, Vec<String>)>>>,
}

impl MockRunner {
    /// Runner whose every invocation succeeds and does nothing
    pub fn new() -> Self {
        Self::with_handler(|_, _| Ok(()))
    }

    pub fn with_handler(
        handler: impl Fn(&Path, &[String]) -> Result<(), ExecError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Arc::new(handler),
            invocations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Get captured invocations (binary, args) for assertions
    pub fn invocations(&self) -> Vec<(PathBuf, Vec<String>)> {
        self.invocations.lock().clone()
    }
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(
        &self,
        _ctx: &CancellationToken,
        _workdir: Option<&Path>,
        _io: IoStreams,
        binary: &Path,
        args: &[String],
    ) -> Result<(), ExecError> {
        self.invocations
            .lock()
            .push((binary.to_path_buf(), args.to_vec()));
        (self.handler)(binary, args)
    }
}

/// Diagnostic sink that collects reported failures
#[derive(Default)]
pub struct MockDiagnostics {
    events: Arc<Mutex<Vec<String>>>,
}

impl MockDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reported messages, one per non-fatal failure
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

impl DiagnosticSink for MockDiagnostics {
    fn error(&self, message: &str, err: &(dyn std::error::Error + 'static)) {
        self.events.lock().push(format!("{}: {}", message, err));
    }
}
