use anyhow::Result;
use serde::Deserialize;

use crate::audio::VisualizerConfig;
use crate::session::SessionConfig;
use crate::upload::UploadConfig;
use crate::validation::ValidationRules;

/// Default config file, resolved relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/cardiac-recorder";

/// Environment variables override file settings, e.g.
/// `CARDIAC_UPLOAD__BASE_URL=http://localhost:9000`
pub const ENV_PREFIX: &str = "CARDIAC";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub upload: UploadConfig,
    pub recording: SessionConfig,
    pub validation: ValidationRules,
    pub visualizer: VisualizerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "cardiac-recorder".to_string(),
        }
    }
}

impl Config {
    /// Load defaults, then the config file (optional), then the environment
    pub fn load(path: Option<&str>) -> Result<Self> {
        let file = match path {
            Some(path) => config::File::with_name(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_PATH).required(false),
        };

        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
