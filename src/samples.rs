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

//! On-demand sample loading.
//!
//! This module provides:
//! - Resolution of sample names to URLs and formats
//! - Fetching of sample bodies over HTTP or from local files
//! - Text and audio container parsing
//! - Centering and integration of the decoded waveform

pub mod fetch;
pub mod locator;
pub mod parser;
pub mod waveform;

mod loader;

pub use fetch::{FetchError, FetchResponse, Fetcher, HttpFetcher, MemoryFetcher};
pub use loader::{LoadError, LoadedSample, SampleLoader, SampleSlot};
pub use locator::SampleLocator;
pub use parser::{DecodeError, ParseError};
