use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

use crate::chat::{
    ConversationSeed, DEFAULT_CONVERSATION_TITLE, DEFAULT_GREETING, DEFAULT_SYSTEM_PROMPT,
};
use crate::llm::ProviderConfig;

/// Default provider ID when none is specified.
pub const DEFAULT_PROVIDER_ID: &str = "openai";

/// Default base URL for OpenAI API.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub const DEFAULT_MODEL: &str = "gpt-4";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u64 = 1000;

/// Instructions the completion endpoint adds ahead of every conversation.
pub const DEFAULT_PREAMBLE: &str = "You are Cosmic AI, a helpful assistant specializing in space, astronomy, and astrophysics. Provide accurate, engaging responses about celestial bodies, space exploration, cosmology, and related topics. Use analogies to explain complex concepts when appropriate.";

/// Environment variable that overrides the settings file location.
pub const SETTINGS_PATH_ENV: &str = "COSMIC_SETTINGS";
const ENV_PREFIX: &str = "COSMIC_";
const SETTINGS_DIR_NAME: &str = "cosmic-ai";
const SETTINGS_FILE_NAME: &str = "settings.toml";

/// Completion endpoint settings. Only `api_key` has no usable default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub provider_id: String,
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u64>,
    pub preamble: Option<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            provider_id: DEFAULT_PROVIDER_ID.to_string(),
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: Some(DEFAULT_TEMPERATURE),
            max_tokens: Some(DEFAULT_MAX_TOKENS),
            preamble: Some(DEFAULT_PREAMBLE.to_string()),
        }
    }
}

impl ProviderSettings {
    /// Creates provider config from these settings.
    pub fn to_provider_config(&self) -> ProviderConfig {
        ProviderConfig::new(&self.provider_id, &self.api_key, &self.base_url, &self.model)
            .with_preamble(self.preamble.clone())
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
    }

    /// Returns true if the settings carry a non-empty API key.
    pub fn is_valid(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

/// What every new conversation starts with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    pub system_prompt: String,
    pub greeting: Option<String>,
    pub default_title: String,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            greeting: Some(DEFAULT_GREETING.to_string()),
            default_title: DEFAULT_CONVERSATION_TITLE.to_string(),
        }
    }
}

impl ChatSettings {
    pub fn to_seed(&self) -> ConversationSeed {
        ConversationSeed {
            system_prompt: self.system_prompt.clone(),
            greeting: self
                .greeting
                .clone()
                .filter(|greeting| !greeting.trim().is_empty()),
            title: self.default_title.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CosmicSettings {
    pub provider: ProviderSettings,
    pub chat: ChatSettings,
}

/// Errors that can occur while loading settings.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("failed to load settings: {source}"))]
    Extract {
        stage: &'static str,
        source: figment::Error,
    },
}

pub type SettingsResult<T> = Result<T, SettingsError>;

/// Layered settings: defaults, then the TOML file, then `OPENAI_*`, then `COSMIC_*`.
pub struct SettingsStore;

impl SettingsStore {
    /// Returns the settings file path, honouring `COSMIC_SETTINGS`.
    pub fn default_config_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(SETTINGS_PATH_ENV).filter(|path| !path.is_empty()) {
            return Some(PathBuf::from(path));
        }

        dirs::config_dir().map(|dir| dir.join(SETTINGS_DIR_NAME).join(SETTINGS_FILE_NAME))
    }

    /// Loads settings from the default path.
    pub fn load() -> SettingsResult<CosmicSettings> {
        Self::load_from(Self::default_config_path().as_deref())
    }

    pub fn load_from(path: Option<&Path>) -> SettingsResult<CosmicSettings> {
        let settings: CosmicSettings = Self::figment(path).extract().context(ExtractSnafu {
            stage: "extract-settings",
        })?;

        tracing::info!(
            path = ?path,
            provider_id = %settings.provider.provider_id,
            model = %settings.provider.model,
            has_api_key = settings.provider.is_valid(),
            "loaded settings"
        );
        Ok(settings)
    }

    fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(CosmicSettings::default()));

        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }

        figment
            .merge(
                Env::raw()
                    .only(&["OPENAI_API_KEY", "OPENAI_BASE_URL", "OPENAI_MODEL"])
                    .map(|key| {
                        let key = key.as_str();
                        if key.eq_ignore_ascii_case("OPENAI_API_KEY") {
                            "provider.api_key".into()
                        } else if key.eq_ignore_ascii_case("OPENAI_BASE_URL") {
                            "provider.base_url".into()
                        } else {
                            "provider.model".into()
                        }
                    }),
            )
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }
}
