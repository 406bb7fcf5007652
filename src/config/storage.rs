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
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// Default storage namespace.
pub const DEFAULT_NAMESPACE: &str = "thurmbox";

/// A YAML representation of the storage configuration.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Storage {
    /// The SQLite database file. When absent, storage is memory-only.
    path: Option<PathBuf>,

    /// The namespace keys are stored under.
    #[serde(default = "default_namespace")]
    namespace: String,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            path: None,
            namespace: default_namespace(),
        }
    }
}

impl Storage {
    /// Creates a new storage configuration.
    pub fn new(path: Option<PathBuf>, namespace: impl Into<String>) -> Self {
        Self {
            path,
            namespace: namespace.into(),
        }
    }

    /// Gets the database path, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Gets the namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.namespace.is_empty() {
            return Err(ConfigError::EmptyNamespace);
        }
        Ok(())
    }
}
