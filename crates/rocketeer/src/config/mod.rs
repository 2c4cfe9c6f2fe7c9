pub mod loader;
pub mod schema;

pub use loader::{
    load_configuration, load_configuration_from_str, load_settings, load_settings_from_str,
};
pub use schema::{
    Configuration, ConfigurationSpec, ConfigurationState, ConfigurationStatus, EngineSettings,
    GitAuthSettings, GitAuthType, GitSettings, LogFormat, LoggingSettings, API_GROUP, API_VERSION,
    CONFIGURATION_KIND, DEFAULT_DESCRIPTORS_FOLDER,
};
