/// Layered configuration: defaults, settings file and environment.
pub mod state;

pub use state::{
    ChatSettings, CosmicSettings, ProviderSettings, SettingsError, SettingsResult, SettingsStore,
};
