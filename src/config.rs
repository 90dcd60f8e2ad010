use anyhow::Result;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Serialize};
use serde_inline_default::serde_inline_default;

use crate::vfs::VfsOptions;

#[serde_inline_default]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VfsConfig {
    #[serde_inline_default("file:///".to_string())]
    /// Root URI selecting the backend: a `file:` scheme for local disk, any
    /// other scheme for a tunneled remote origin.
    pub uri: String,

    #[serde(flatten)]
    pub options: VfsOptions,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub vfs: VfsConfig,
}

impl Config {
    pub fn load() -> Result<Config> {
        Self::extract(
            Figment::new()
                .merge(Toml::file("portage.toml"))
                .merge(Env::prefixed("PORTAGE_").split("__")),
        )
    }

    fn extract(figment: Figment) -> Result<Config> {
        Ok(figment.extract()?)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = Config::extract(Figment::new().merge(Toml::string("[vfs]"))).unwrap();

        assert_eq!(config.vfs.uri, "file:///");
        assert_eq!(config.vfs.options.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn configured_values_override_defaults() {
        let config = Config::extract(Figment::new().merge(Toml::string(
            r#"
                [vfs]
                uri = "http://files.example:8020"
                connect_timeout = "2s"
            "#,
        )))
        .unwrap();

        assert_eq!(config.vfs.uri, "http://files.example:8020");
        assert_eq!(config.vfs.options.connect_timeout, Duration::from_secs(2));
    }
}
