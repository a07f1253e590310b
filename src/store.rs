//! Dataset store
//!
//! Loads the named JSON collections once at startup and exposes them
//! read-only for the lifetime of the process.

use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::DatasetsConfig;

/// An ordered sequence of opaque JSON records, immutable after load.
pub type Collection = Vec<Value>;

pub const USERS: &str = "users";
pub const POSTS: &str = "posts";

#[derive(Debug, Error)]
pub enum StoreError {
    /// Internal misuse: no route can reach this, callers pass fixed names.
    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    #[error("failed to read dataset file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse dataset file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("dataset file {path} must contain a JSON array")]
    NotAnArray { path: PathBuf },
}

#[derive(Debug)]
pub struct DatasetStore {
    users: Collection,
    posts: Collection,
}

impl DatasetStore {
    /// Load both collections from the configured data directory.
    ///
    /// Any missing or malformed file is fatal: the caller aborts startup.
    pub fn load(cfg: &DatasetsConfig) -> Result<Self, StoreError> {
        let dir = Path::new(&cfg.data_dir);
        let users = load_collection(&dir.join(&cfg.users_file))?;
        let posts = load_collection(&dir.join(&cfg.posts_file))?;
        Ok(Self::from_collections(users, posts))
    }

    /// Build a store from already-loaded collections.
    pub const fn from_collections(users: Collection, posts: Collection) -> Self {
        Self { users, posts }
    }

    /// Look up a collection by name.
    pub fn get(&self, name: &str) -> Result<&Collection, StoreError> {
        match name {
            USERS => Ok(&self.users),
            POSTS => Ok(&self.posts),
            other => Err(StoreError::UnknownCollection(other.to_string())),
        }
    }

    pub const fn users(&self) -> &Collection {
        &self.users
    }

    pub const fn posts(&self) -> &Collection {
        &self.posts
    }
}

fn load_collection(path: &Path) -> Result<Collection, StoreError> {
    let raw = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let value: Value = serde_json::from_str(&raw).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    match value {
        Value::Array(records) => Ok(records),
        _ => Err(StoreError::NotAnArray {
            path: path.to_path_buf(),
        }),
    }
}
