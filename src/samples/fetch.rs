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

//! Fetching of sample bodies.
//!
//! Fetchers are blocking; the loader runs them on the tokio blocking pool.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Read};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;
use url::Url;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Error types for fetch operations. HTTP error statuses are not errors; they
/// are returned as responses.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Invalid URL '{0}'")]
    InvalidUrl(String),

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Body exceeded {0} bytes")]
    TooLarge(usize),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Fetch task failed: {0}")]
    Interrupted(String),
}

/// A fetched response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    status: u16,
    body: Vec<u8>,
}

impl FetchResponse {
    /// Creates a new response.
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    /// Creates a successful response with the given body.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::new(200, body.into())
    }

    /// Gets the status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Consumes the response, returning its body.
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }
}

/// Retrieves sample bodies by URL.
pub trait Fetcher: Send + Sync {
    /// Performs a GET of the given URL.
    fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError>;
}

/// Fetches over HTTP(S) with a shared agent, and serves `file://` URLs from disk.
pub struct HttpFetcher {
    agent: ureq::Agent,
    max_body_bytes: usize,
}

impl HttpFetcher {
    /// Creates a new fetcher that refuses bodies larger than `max_body_bytes`.
    pub fn new(max_body_bytes: usize) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout_connect(CONNECT_TIMEOUT)
                .timeout_read(READ_TIMEOUT)
                .build(),
            max_body_bytes,
        }
    }

    fn fetch_file(&self, url: &Url) -> Result<FetchResponse, FetchError> {
        let path = url
            .to_file_path()
            .map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
        match fs::metadata(&path) {
            Ok(metadata) if metadata.len() > self.max_body_bytes as u64 => {
                Err(FetchError::TooLarge(self.max_body_bytes))
            }
            Ok(_) => Ok(FetchResponse::ok(fs::read(&path)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Ok(FetchResponse::new(404, Vec::new()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn read_body(&self, response: ureq::Response) -> Result<Vec<u8>, FetchError> {
        let mut body = Vec::new();
        response
            .into_reader()
            .take(self.max_body_bytes as u64 + 1)
            .read_to_end(&mut body)?;
        if body.len() > self.max_body_bytes {
            return Err(FetchError::TooLarge(self.max_body_bytes));
        }
        Ok(body)
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let parsed = Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
        if parsed.scheme() == "file" {
            return self.fetch_file(&parsed);
        }

        debug!(url, "Fetching sample");
        match self.agent.get(url).call() {
            Ok(response) => {
                let status = response.status();
                Ok(FetchResponse::new(status, self.read_body(response)?))
            }
            // The body of an error status is of no use to the loader.
            Err(ureq::Error::Status(status, _)) => Ok(FetchResponse::new(status, Vec::new())),
            Err(ureq::Error::Transport(transport)) => {
                Err(FetchError::Transport(transport.to_string()))
            }
        }
    }
}

/// Serves registered bodies from memory; unknown URLs are answered with a 404.
#[derive(Default)]
pub struct MemoryFetcher {
    responses: HashMap<String, FetchResponse>,
    requests: Mutex<Vec<String>>,
}

impl MemoryFetcher {
    /// Creates an empty fetcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a response for a URL.
    pub fn with_response(mut self, url: impl Into<String>, response: FetchResponse) -> Self {
        self.responses.insert(url.into(), response);
        self
    }

    /// Every URL requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

impl Fetcher for MemoryFetcher {
    fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        self.requests.lock().push(url.to_string());
        Ok(self
            .responses
            .get(url)
            .cloned()
            .unwrap_or_else(|| FetchResponse::new(404, Vec::new())))
    }
}
