pub use crate::errors::ConfigError;
pub use crate::handle::SettingsHandle;
pub use crate::loader::{load_settings, ENV_PREFIX};
pub use crate::settings::{AlertRuleConfig, Settings};
