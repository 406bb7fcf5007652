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
use std::collections::HashMap;
use std::fmt;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// Default sample rate that container formats are decoded at.
pub const DEFAULT_SAMPLE_RATE: u32 = 8000;

/// Default upper bound on the size of a fetched sample body.
pub const DEFAULT_MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// The encoding of a sample body.
///
/// In configuration, `text` selects the newline-delimited text format and any
/// other identifier selects the generic audio container format.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum SampleFormat {
    /// One floating point value per line.
    Text,
    /// Any audio container symphonia can probe.
    #[default]
    Generic,
}

impl From<&str> for SampleFormat {
    fn from(value: &str) -> Self {
        if value.eq_ignore_ascii_case("text") {
            SampleFormat::Text
        } else {
            SampleFormat::Generic
        }
    }
}

impl From<String> for SampleFormat {
    fn from(value: String) -> Self {
        SampleFormat::from(value.as_str())
    }
}

impl From<SampleFormat> for String {
    fn from(value: SampleFormat) -> Self {
        value.to_string()
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleFormat::Text => write!(f, "text"),
            SampleFormat::Generic => write!(f, "generic"),
        }
    }
}

/// A resolved location for a sample: where to fetch it and how to parse it.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct SampleDefinition {
    /// The URL to fetch the sample body from.
    url: String,

    /// The format of the sample body.
    #[serde(default)]
    format: SampleFormat,
}

impl SampleDefinition {
    /// Creates a new sample definition.
    pub fn new(url: impl Into<String>, format: SampleFormat) -> Self {
        Self {
            url: url.into(),
            format,
        }
    }

    /// Gets the URL of the sample.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Gets the format of the sample.
    pub fn format(&self) -> SampleFormat {
        self.format
    }
}

/// Maps sample names matching a pattern into a folder.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct FolderMapping {
    /// The folder prefix, including its trailing separator.
    folder: String,

    /// A regular expression matched case-insensitively against the sample name.
    pattern: String,
}

impl FolderMapping {
    /// Creates a new folder mapping.
    pub fn new(folder: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            pattern: pattern.into(),
        }
    }

    /// Gets the folder prefix.
    pub fn folder(&self) -> &str {
        &self.folder
    }

    /// Gets the name pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    fn compile(&self) -> Result<Regex, ConfigError> {
        RegexBuilder::new(&self.pattern)
            .case_insensitive(true)
            .build()
            .map_err(|source| ConfigError::InvalidPattern {
                pattern: self.pattern.clone(),
                source,
            })
    }
}

/// The sample loading configuration.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Samples {
    /// Prepended to every derived sample URL. Must be empty or end in '/'.
    #[serde(default)]
    base_prefix: String,

    /// Appended to every derived sample URL, usually a file extension.
    #[serde(default)]
    base_suffix: String,

    /// The format of samples that have no override.
    #[serde(default)]
    default_format: SampleFormat,

    /// The sample rate container formats are decoded at.
    #[serde(default = "default_sample_rate")]
    sample_rate: u32,

    /// The largest sample body that will be read.
    #[serde(default = "default_max_body_bytes")]
    max_body_bytes: usize,

    /// Ordered folder mappings; the first matching pattern wins.
    #[serde(default)]
    folders: Vec<FolderMapping>,

    /// Explicit definitions that bypass URL derivation.
    #[serde(default)]
    overrides: HashMap<String, SampleDefinition>,
}

fn default_sample_rate() -> u32 {
    DEFAULT_SAMPLE_RATE
}

fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

impl Default for Samples {
    fn default() -> Self {
        Self {
            base_prefix: String::new(),
            base_suffix: String::new(),
            default_format: SampleFormat::default(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            folders: Vec::new(),
            overrides: HashMap::new(),
        }
    }
}

impl Samples {
    /// Creates a new sample configuration with default decoding limits.
    pub fn new(
        base_prefix: impl Into<String>,
        base_suffix: impl Into<String>,
        default_format: SampleFormat,
        folders: Vec<FolderMapping>,
        overrides: HashMap<String, SampleDefinition>,
    ) -> Self {
        Self {
            base_prefix: base_prefix.into(),
            base_suffix: base_suffix.into(),
            default_format,
            folders,
            overrides,
            ..Default::default()
        }
    }

    /// Gets the base URL prefix.
    pub fn base_prefix(&self) -> &str {
        &self.base_prefix
    }

    /// Gets the base URL suffix.
    pub fn base_suffix(&self) -> &str {
        &self.base_suffix
    }

    /// Gets the default sample format.
    pub fn default_format(&self) -> SampleFormat {
        self.default_format
    }

    /// Gets the decode sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Gets the maximum body size in bytes.
    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    /// Gets the folder mappings in match order.
    pub fn folders(&self) -> &[FolderMapping] {
        &self.folders
    }

    /// Gets the override table.
    pub fn overrides(&self) -> &HashMap<String, SampleDefinition> {
        &self.overrides
    }

    /// Compiles the folder patterns, preserving table order.
    pub fn compiled_folders(&self) -> Result<Vec<(String, Regex)>, ConfigError> {
        self.folders
            .iter()
            .map(|mapping| Ok((mapping.folder.clone(), mapping.compile()?)))
            .collect()
    }

    /// Checks the configuration for values the loader cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.base_prefix.is_empty() && !self.base_prefix.ends_with('/') {
            return Err(ConfigError::InvalidBasePrefix(self.base_prefix.clone()));
        }
        if self.sample_rate == 0 {
            return Err(ConfigError::InvalidSampleRate);
        }
        self.compiled_folders()?;
        Ok(())
    }
}

#[cfg(test)]
impl Samples {
    /// Overrides the decode sample rate (test only).
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }
}
