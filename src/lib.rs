pub mod config;
pub mod runtime;
pub mod snapshot;
pub mod util;

pub use config::{ArchiveRef, ClusterConfig, ConfigError, Platform};
pub use runtime::{
    BinaryProvisioner, CommandRunner, ComponentLifecycle, ComponentManager, ComponentSpec,
    DiagnosticSink, ExecError, ExecRunner, HttpProvisioner, IoStreams, LifecycleError,
    ProvisionError, ProvisionRequest, TracingDiagnostics, ETCD_COMPONENT,
};
pub use snapshot::{SnapshotCoordinator, SnapshotError};
