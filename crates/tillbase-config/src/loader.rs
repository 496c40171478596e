use crate::errors::ConfigError;
use crate::settings::Settings;
use std::path::Path;

pub const ENV_PREFIX: &str = "TILLBASE";

/// Load settings from an optional TOML file with a `TILLBASE__`-prefixed
/// environment overlay. A missing file is not an error; defaults apply.
pub fn load_settings(path: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = config::Config::builder();

    if let Some(file) = path {
        if Path::new(file).exists() {
            builder = builder.add_source(config::File::from(Path::new(file)));
        }
    }

    builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"));

    let settings: Settings = builder
        .build()
        .map_err(|err| ConfigError::invalid(&format!("failed to build configuration: {err}")))?
        .try_deserialize()
        .map_err(|err| {
            ConfigError::invalid(&format!("failed to deserialize configuration: {err}"))
        })?;

    Ok(settings)
}
