//! Start/stop of named managed components
//!
//! A component is an external binary the controller supervises (the store
//! process, mostly). Specs are registered up front; start and stop address
//! them by name so callers never hold process handles themselves.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Unknown component: {0}")]
    UnknownComponent(String),
    #[error("Component {0} is already running")]
    AlreadyRunning(String),
    #[error("Component {0} is not running")]
    NotRunning(String),
    #[error("Failed to spawn component {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to wait for component {name}: {source}")]
    Wait {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Stopping component {0} was cancelled")]
    Cancelled(String),
}

/// Transitions a named component between running and stopped
#[async_trait]
pub trait ComponentLifecycle: Send + Sync {
    async fn start(&self, ctx: &CancellationToken, name: &str) -> Result<(), LifecycleError>;
    async fn stop(&self, ctx: &CancellationToken, name: &str) -> Result<(), LifecycleError>;
}

/// Launch definition for a managed component
#[derive(Debug, Clone)]
pub struct ComponentSpec {
    pub binary: PathBuf,
    pub args: Vec<String>,
    pub workdir: Option<PathBuf>,
}

/// ComponentLifecycle backed by tokio subprocesses
#[derive(Default)]
pub struct ComponentManager {
    specs: Mutex<HashMap<String, ComponentSpec>>,
    running: Mutex<HashMap<String, Child>>,
}

impl ComponentManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the launch definition for a component
    pub fn register(&self, name: impl Into<String>, spec: ComponentSpec) {
        self.specs.lock().insert(name.into(), spec);
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.running.lock().contains_key(name)
    }
}

#[async_trait]
impl ComponentLifecycle for ComponentManager {
    async fn start(&self, _ctx: &CancellationToken, name: &str) -> Result<(), LifecycleError> {
        let spec = self
            .specs
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| LifecycleError::UnknownComponent(name.to_string()))?;

        let mut running = self.running.lock();
        if running.contains_key(name) {
            return Err(LifecycleError::AlreadyRunning(name.to_string()));
        }

        let mut cmd = Command::new(&spec.binary);
        cmd.args(&spec.args);
        if let Some(dir) = &spec.workdir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());

        let child = cmd.spawn().map_err(|source| LifecycleError::Spawn {
            name: name.to_string(),
            source,
        })?;

        tracing::info!(component = name, "Started component");
        running.insert(name.to_string(), child);
        Ok(())
    }

    async fn stop(&self, ctx: &CancellationToken, name: &str) -> Result<(), LifecycleError> {
        if !self.specs.lock().contains_key(name) {
            return Err(LifecycleError::UnknownComponent(name.to_string()));
        }

        let mut child = self
            .running
            .lock()
            .remove(name)
            .ok_or_else(|| LifecycleError::NotRunning(name.to_string()))?;

        // Ask nicely first; escalate to SIGKILL only on cancellation.
        #[cfg(unix)]
        if let Some(pid) = child.id() {
            unsafe {
                libc::kill(pid as i32, libc::SIGTERM);
            }
        }
        #[cfg(not(unix))]
        let _ = child.start_kill();

        tokio::select! {
            status = child.wait() => {
                status.map_err(|source| LifecycleError::Wait {
                    name: name.to_string(),
                    source,
                })?;
            }
            _ = ctx.cancelled() => {
                let _ = child.kill().await;
                return Err(LifecycleError::Cancelled(name.to_string()));
            }
        }

        tracing::info!(component = name, "Stopped component");
        Ok(())
    }
}
