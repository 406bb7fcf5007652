// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::path::Path;

use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use serde::Deserialize;

pub mod error;
pub mod samples;
pub mod storage;

pub use self::error::ConfigError;
pub use self::samples::{FolderMapping, SampleDefinition, SampleFormat, Samples};
pub use self::storage::Storage;

/// Environment variable prefix for configuration overrides.
const ENV_PREFIX: &str = "THURMBOX";

/// The complete configuration. Built once and passed explicitly to whatever
/// needs it; nothing reads configuration from global state.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Settings {
    /// Sample loading configuration.
    #[serde(default)]
    samples: Samples,

    /// Storage configuration.
    #[serde(default)]
    storage: Storage,
}

impl Settings {
    /// Loads settings from an optional YAML file, then applies `THURMBOX_*`
    /// environment overrides, e.g. `THURMBOX_SAMPLES__BASE_PREFIX`.
    pub fn load(path: Option<&Path>) -> Result<Settings, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        Self::build(builder)
    }

    /// Parses settings from a YAML string, then applies environment overrides.
    pub fn from_yaml(yaml: &str) -> Result<Settings, ConfigError> {
        Self::build(Config::builder().add_source(File::from_str(yaml, FileFormat::Yaml)))
    }

    fn build(
        builder: ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Settings, ConfigError> {
        let settings: Settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        settings.samples.validate()?;
        settings.storage.validate()?;
        Ok(settings)
    }

    /// Gets the sample loading configuration.
    pub fn samples(&self) -> &Samples {
        &self.samples
    }

    /// Gets the storage configuration.
    pub fn storage(&self) -> &Storage {
        &self.storage
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serial_test::serial;

    use super::*;

    #[test]
    #[serial]
    fn test_settings_from_yaml() {
        let settings = Settings::from_yaml(
            r#"
            samples:
              base_prefix: "https://samples.example/"
              base_suffix: ".txt"
              default_format: text
              sample_rate: 22050
            storage:
              path: "/tmp/thurmbox.sqlite"
              namespace: "tab-1"
            "#,
        )
        .unwrap();

        assert_eq!(settings.samples().base_prefix(), "https://samples.example/");
        assert_eq!(settings.samples().default_format(), SampleFormat::Text);
        assert_eq!(settings.samples().sample_rate(), 22050);
        assert_eq!(
            settings.storage().path(),
            Some(Path::new("/tmp/thurmbox.sqlite"))
        );
        assert_eq!(settings.storage().namespace(), "tab-1");
    }

    #[test]
    #[serial]
    fn test_settings_defaults() {
        let settings = Settings::load(None).unwrap();

        assert_eq!(settings.samples().base_prefix(), "");
        assert_eq!(settings.samples().sample_rate(), samples::DEFAULT_SAMPLE_RATE);
        assert_eq!(settings.storage().path(), None);
        assert_eq!(settings.storage().namespace(), storage::DEFAULT_NAMESPACE);
    }

    #[test]
    #[serial]
    fn test_settings_from_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "samples:\n  base_prefix: \"file:///srv/samples/\"\n  base_suffix: \".wav\""
        )
        .unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.samples().base_prefix(), "file:///srv/samples/");
        assert_eq!(settings.samples().base_suffix(), ".wav");
    }

    #[test]
    #[serial]
    fn test_environment_overrides() {
        std::env::set_var("THURMBOX_SAMPLES__BASE_SUFFIX", ".flac");
        std::env::set_var("THURMBOX_STORAGE__NAMESPACE", "tab-2");
        let settings = Settings::from_yaml("samples:\n  base_suffix: \".wav\"\n");
        std::env::remove_var("THURMBOX_SAMPLES__BASE_SUFFIX");
        std::env::remove_var("THURMBOX_STORAGE__NAMESPACE");

        let settings = settings.unwrap();
        assert_eq!(settings.samples().base_suffix(), ".flac");
        assert_eq!(settings.storage().namespace(), "tab-2");
    }

    #[test]
    #[serial]
    fn test_invalid_settings_rejected() {
        let result = Settings::from_yaml("samples:\n  base_prefix: \"https://samples.example\"\n");
        assert!(matches!(result, Err(ConfigError::InvalidBasePrefix(_))));

        let result = Settings::from_yaml("storage:\n  namespace: \"\"\n");
        assert!(matches!(result, Err(ConfigError::EmptyNamespace)));
    }
}
