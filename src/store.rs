//! Whole-document persistence for the catalog.

use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use tracing::debug;

use crate::catalog::Catalog;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read catalog ({path:?}): {error}")]
    Read {
        error: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse catalog ({path:?}): {error}")]
    Parse {
        error: serde_json::Error,
        path: PathBuf,
    },
    #[error("failed to serialize catalog: {0}")]
    Serialize(serde_json::Error),
    #[error("failed to write catalog ({path:?}): {error}")]
    Write {
        error: std::io::Error,
        path: PathBuf,
    },
}

/// Load/save access to the catalog document.
///
/// Every transform reads the whole catalog, mutates it in memory and hands the
/// complete document back. There is no locking; the last `save` wins.
pub trait CatalogStore {
    fn load(&self) -> Result<Catalog, Error>;
    fn save(&self, catalog: &Catalog) -> Result<(), Error>;
}

/// `wines.json` on disk.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// Two-space indented JSON. Non-ASCII text is written as is.
pub fn to_pretty_json(catalog: &Catalog) -> Result<Vec<u8>, Error> {
    serde_json::to_vec_pretty(catalog).map_err(Error::Serialize)
}

impl CatalogStore for JsonFileStore {
    fn load(&self) -> Result<Catalog, Error> {
        let content = std::fs::read_to_string(&self.path).map_err(|error| Error::Read {
            error,
            path: self.path.clone(),
        })?;
        serde_json::from_str(&content).map_err(|error| Error::Parse {
            error,
            path: self.path.clone(),
        })
    }

    fn save(&self, catalog: &Catalog) -> Result<(), Error> {
        let body = to_pretty_json(catalog)?;
        let staging = self.staging_path();
        let write_error = |error| Error::Write {
            error,
            path: self.path.clone(),
        };
        std::fs::write(&staging, &body).map_err(write_error)?;
        std::fs::rename(&staging, &self.path).map_err(write_error)?;
        debug!(path = ?self.path, bytes = body.len(), "catalog written");
        Ok(())
    }
}

/// Catalog held in memory, for fixtures.
#[derive(Default)]
pub struct MemoryStore {
    catalog: Mutex<Catalog>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog: Mutex::new(catalog),
            saves: Mutex::new(0),
        }
    }

    pub fn snapshot(&self) -> Catalog {
        self.catalog
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of times `save` has been called.
    pub fn saves(&self) -> usize {
        *self
            .saves
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CatalogStore for MemoryStore {
    fn load(&self) -> Result<Catalog, Error> {
        Ok(self.snapshot())
    }

    fn save(&self, catalog: &Catalog) -> Result<(), Error> {
        *self
            .catalog
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = catalog.clone();
        *self
            .saves
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) += 1;
        Ok(())
    }
}
