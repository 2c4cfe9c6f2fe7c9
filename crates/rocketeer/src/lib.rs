pub mod config;
pub mod error;
pub mod gitops;
pub mod sanitize;
pub mod secrets;
pub mod store;
pub mod telemetry;

pub use config::{
    load_configuration, load_settings, Configuration, ConfigurationSpec, ConfigurationStatus,
    EngineSettings,
};
pub use error::{ConfigError, Result, RocketeerError};
pub use gitops::{
    ApplyPolicy, GitOpsEngine, GitOpsError, Outcome, ReconcileReport, ReconcileRequest,
    SyncScheduler,
};
pub use secrets::{resolve_secret, SecretError};
pub use store::{MemoryStore, ResourceStore, StoreError};
pub use telemetry::init_tracing;
