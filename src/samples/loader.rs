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

//! Sample loading for playback.
//!
//! A load resolves the sample, fetches its body, parses it and derives the
//! centered and integral waveforms. Nothing is cached between loads.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::fetch::{FetchError, Fetcher, HttpFetcher};
use super::locator::SampleLocator;
use super::parser::{self, DecodeError, ParseError};
use super::waveform;
use crate::config::{ConfigError, SampleDefinition, SampleFormat, Samples};

/// Error types for a sample load. Every variant names the sample and its URL.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to fetch sample {name} from {url}: {source}")]
    Fetch {
        name: String,
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("Failed to fetch sample {name} from {url}: HTTP status {status}")]
    Status {
        name: String,
        url: String,
        status: u16,
    },

    #[error("Sample {name} from {url} is not UTF-8 text: {source}")]
    Body {
        name: String,
        url: String,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("Failed to parse sample {name} from {url}: {source}")]
    Parse {
        name: String,
        url: String,
        #[source]
        source: ParseError,
    },

    #[error("Failed to decode sample {name} from {url}: {source}")]
    Decode {
        name: String,
        url: String,
        #[source]
        source: DecodeError,
    },
}

impl LoadError {
    /// The name of the sample that failed to load.
    pub fn name(&self) -> &str {
        match self {
            LoadError::Fetch { name, .. }
            | LoadError::Status { name, .. }
            | LoadError::Body { name, .. }
            | LoadError::Parse { name, .. }
            | LoadError::Decode { name, .. } => name,
        }
    }

    /// The URL the sample was fetched from.
    pub fn url(&self) -> &str {
        match self {
            LoadError::Fetch { url, .. }
            | LoadError::Status { url, .. }
            | LoadError::Body { url, .. }
            | LoadError::Parse { url, .. }
            | LoadError::Decode { url, .. } => url,
        }
    }
}

/// A successfully loaded sample.
#[derive(Debug, Clone)]
pub struct LoadedSample {
    name: String,
    definition: SampleDefinition,
    /// Mean-centered samples plus the reserved tail.
    raw: Vec<f32>,
    /// Exclusive prefix sum of the uncentered samples plus the reserved tail.
    integral: Vec<f32>,
}

impl LoadedSample {
    /// Gets the sample name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the definition the sample was loaded from.
    pub fn definition(&self) -> &SampleDefinition {
        &self.definition
    }

    /// Gets the centered waveform.
    pub fn raw(&self) -> &[f32] {
        &self.raw
    }

    /// Gets the integral waveform.
    pub fn integral(&self) -> &[f32] {
        &self.integral
    }

    /// Consumes the sample, returning the raw and integral waveforms.
    pub fn into_waveforms(self) -> (Vec<f32>, Vec<f32>) {
        (self.raw, self.integral)
    }
}

/// A shared container of samples owned by the host. It starts out with
/// placeholder data and is replaced wholesale when a load completes.
#[derive(Debug, Clone, Default)]
pub struct SampleSlot {
    samples: Arc<RwLock<Vec<f32>>>,
}

impl SampleSlot {
    /// Creates a slot holding placeholder samples.
    pub fn new(placeholder: Vec<f32>) -> Self {
        Self {
            samples: Arc::new(RwLock::new(placeholder)),
        }
    }

    /// Returns a copy of the current samples.
    pub fn samples(&self) -> Vec<f32> {
        self.samples.read().clone()
    }

    /// Runs a closure against the current samples without copying them.
    pub fn with_samples<R>(&self, f: impl FnOnce(&[f32]) -> R) -> R {
        f(&self.samples.read())
    }

    /// Gets the number of samples currently held.
    pub fn len(&self) -> usize {
        self.samples.read().len()
    }

    /// Whether the slot is empty.
    pub fn is_empty(&self) -> bool {
        self.samples.read().is_empty()
    }

    /// Replaces the contents of the slot.
    pub fn replace(&self, samples: Vec<f32>) {
        *self.samples.write() = samples;
    }
}

/// Loads samples by name.
#[derive(Clone)]
pub struct SampleLoader {
    locator: Arc<SampleLocator>,
    fetcher: Arc<dyn Fetcher>,
    /// Sample rate container formats are decoded at.
    sample_rate: u32,
}

impl SampleLoader {
    /// Creates a new sample loader.
    pub fn new(locator: SampleLocator, fetcher: Arc<dyn Fetcher>, sample_rate: u32) -> Self {
        Self {
            locator: Arc::new(locator),
            fetcher,
            sample_rate,
        }
    }

    /// Creates a loader that fetches over HTTP according to the configuration.
    pub fn from_config(config: &Samples) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(
            SampleLocator::new(config)?,
            Arc::new(HttpFetcher::new(config.max_body_bytes())),
            config.sample_rate(),
        ))
    }

    /// Resolves a sample name without loading it.
    pub fn resolve(&self, name: &str) -> SampleDefinition {
        self.locator.resolve(name)
    }

    /// Loads a sample. Stages run strictly in order and the first failure ends
    /// the load.
    pub async fn load(&self, name: &str) -> Result<LoadedSample, LoadError> {
        let definition = self.locator.resolve(name);
        let url = definition.url().to_string();
        debug!(name, url = %url, format = %definition.format(), "Loading sample");

        let fetcher = self.fetcher.clone();
        let fetch_url = url.clone();
        let response = tokio::task::spawn_blocking(move || fetcher.fetch(&fetch_url))
            .await
            .map_err(|e| FetchError::Interrupted(e.to_string()))
            .and_then(|result| result)
            .map_err(|source| LoadError::Fetch {
                name: name.to_string(),
                url: url.clone(),
                source,
            })?;

        if !response.is_success() {
            return Err(LoadError::Status {
                name: name.to_string(),
                url,
                status: response.status(),
            });
        }

        let decoded = match definition.format() {
            SampleFormat::Text => {
                let text =
                    String::from_utf8(response.into_body()).map_err(|source| LoadError::Body {
                        name: name.to_string(),
                        url: url.clone(),
                        source,
                    })?;
                parser::parse_text(&text)
                    .await
                    .map_err(|source| LoadError::Parse {
                        name: name.to_string(),
                        url: url.clone(),
                        source,
                    })?
            }
            SampleFormat::Generic => parser::parse_generic(response.into_body(), self.sample_rate)
                .await
                .map_err(|source| LoadError::Decode {
                    name: name.to_string(),
                    url: url.clone(),
                    source,
                })?,
        };

        // The integral is taken over the uncentered values.
        let integral = waveform::integral(&waveform::extend(&decoded));
        let raw = waveform::center(&decoded);

        info!(
            name,
            url = %url,
            samples = decoded.len(),
            "Sample loaded"
        );

        Ok(LoadedSample {
            name: name.to_string(),
            definition,
            raw,
            integral,
        })
    }

    /// Loads a sample in the background and writes the results into the given
    /// slots. On failure the slots keep their placeholder data and a single
    /// error is logged; nothing is reported to the caller.
    pub fn spawn_load(
        &self,
        name: impl Into<String>,
        raw: Option<SampleSlot>,
        integral: Option<SampleSlot>,
    ) -> JoinHandle<()> {
        let loader = self.clone();
        let name = name.into();
        tokio::spawn(async move {
            match loader.load(&name).await {
                Ok(sample) => {
                    let (raw_samples, integral_samples) = sample.into_waveforms();
                    if let Some(raw) = raw {
                        raw.replace(raw_samples);
                    }
                    if let Some(integral) = integral {
                        integral.replace(integral_samples);
                    }
                }
                Err(e) => {
                    error!(name = e.name(), url = e.url(), err = %e, "Failed to load sample");
                }
            }
        })
    }
}

impl std::fmt::Debug for SampleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleLoader")
            .field("locator", &self.locator)
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}
