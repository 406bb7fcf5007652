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

//! Maps sample names to the URL and format they are loaded from.

use std::collections::HashMap;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;

use crate::config::{ConfigError, SampleDefinition, SampleFormat, Samples};

/// Characters escaped when a name is embedded as a URL component. Everything
/// but ASCII alphanumerics and `- _ . ! ~ * ' ( )` is escaped.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encodes a sample name for use as a single URL path segment.
pub fn encode_component(name: &str) -> String {
    utf8_percent_encode(name, COMPONENT).to_string()
}

/// Resolves sample names against an override table and an ordered folder table.
#[derive(Debug, Clone)]
pub struct SampleLocator {
    base_prefix: String,
    base_suffix: String,
    default_format: SampleFormat,
    folders: Vec<(String, Regex)>,
    overrides: HashMap<String, SampleDefinition>,
}

impl SampleLocator {
    /// Creates a locator from the sample configuration, compiling its folder patterns.
    pub fn new(config: &Samples) -> Result<Self, ConfigError> {
        Ok(Self {
            base_prefix: config.base_prefix().to_string(),
            base_suffix: config.base_suffix().to_string(),
            default_format: config.default_format(),
            folders: config.compiled_folders()?,
            overrides: config.overrides().clone(),
        })
    }

    /// Resolves a sample name. Never fails: names that match no folder pattern
    /// resolve directly under the base prefix.
    pub fn resolve(&self, name: &str) -> SampleDefinition {
        if let Some(definition) = self.overrides.get(name) {
            return definition.clone();
        }

        let folder = self.folder_for(name).unwrap_or("");
        SampleDefinition::new(
            format!(
                "{}{}{}{}",
                self.base_prefix,
                folder,
                encode_component(name),
                self.base_suffix
            ),
            self.default_format,
        )
    }

    /// Patterns see the raw name, not the encoded one.
    fn folder_for(&self, name: &str) -> Option<&str> {
        self.folders
            .iter()
            .find(|(_, pattern)| pattern.is_match(name))
            .map(|(folder, _)| folder.as_str())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::FolderMapping;

    use super::*;

    fn locator(overrides: HashMap<String, SampleDefinition>) -> SampleLocator {
        let config = Samples::new(
            "https://samples.example/",
            ".wav",
            SampleFormat::Generic,
            vec![
                FolderMapping::new("a-m/", "^[a-m]"),
                FolderMapping::new("kicks/", "kick"),
                FolderMapping::new("n-z/", "^[n-z]"),
            ],
            overrides,
        );
        SampleLocator::new(&config).unwrap()
    }

    #[test]
    fn test_encode_component() {
        assert_eq!(encode_component("kick"), "kick");
        assert_eq!(encode_component("my kick#2"), "my%20kick%232");
        assert_eq!(encode_component("a/b?c"), "a%2Fb%3Fc");
        assert_eq!(encode_component("(x)_y-z.!~*'"), "(x)_y-z.!~*'");
        assert_eq!(encode_component("é"), "%C3%A9");
    }

    #[test]
    fn test_override_wins() {
        let overrides = HashMap::from([(
            "kick".to_string(),
            SampleDefinition::new("https://elsewhere.example/k.txt", SampleFormat::Text),
        )]);
        let locator = locator(overrides);

        let definition = locator.resolve("kick");
        assert_eq!(definition.url(), "https://elsewhere.example/k.txt");
        assert_eq!(definition.format(), SampleFormat::Text);
    }

    #[test]
    fn test_first_matching_folder_wins() {
        let locator = locator(HashMap::new());

        // "kick" matches both "^[a-m]" and "kick"; table order decides.
        let definition = locator.resolve("kick");
        assert_eq!(definition.url(), "https://samples.example/a-m/kick.wav");
        assert_eq!(definition.format(), SampleFormat::Generic);

        let definition = locator.resolve("snare");
        assert_eq!(definition.url(), "https://samples.example/n-z/snare.wav");
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let locator = locator(HashMap::new());

        let definition = locator.resolve("Snare");
        assert_eq!(definition.url(), "https://samples.example/n-z/Snare.wav");

        let definition = locator.resolve("808 KICK");
        assert_eq!(
            definition.url(),
            "https://samples.example/kicks/808%20KICK.wav"
        );
    }

    #[test]
    fn test_no_match_uses_empty_folder() {
        let locator = locator(HashMap::new());

        let definition = locator.resolve("909 hat");
        assert_eq!(definition.url(), "https://samples.example/909%20hat.wav");
    }

    #[test]
    fn test_patterns_see_raw_name() {
        let config = Samples::new(
            "",
            "",
            SampleFormat::Text,
            vec![FolderMapping::new("spaced/", "^a b$")],
            HashMap::new(),
        );
        let locator = SampleLocator::new(&config).unwrap();

        let definition = locator.resolve("A B");
        assert_eq!(definition.url(), "spaced/A%20B");
        assert_eq!(definition.format(), SampleFormat::Text);
    }

    #[test]
    fn test_invalid_pattern() {
        let config = Samples::new(
            "",
            "",
            SampleFormat::Generic,
            vec![FolderMapping::new("x/", "(")],
            HashMap::new(),
        );
        assert!(matches!(
            SampleLocator::new(&config),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }
}
