pub mod settings;

pub use settings::{ArchiveRef, ClusterConfig, ConfigError, Platform, CONFIG_FILE_NAME};
