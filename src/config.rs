use crate::resolve::Fallback;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Everything a request needs to know about where and how to serve, built once at startup.
#[derive(Debug)]
pub struct Config {
    pub listen: SocketAddr,
    /// Canonicalized asset root.
    pub root: PathBuf,
    /// Bare filename of the entry document, relative to `root`.
    pub index: String,
    pub fallback: Fallback,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("asset root {} is not accessible: {source}", .path.display())]
    Root { path: PathBuf, source: io::Error },
    #[error("asset root {} is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("entry document must be a plain file name, got {0:?}")]
    InvalidIndex(String),
}

impl Config {
    pub fn new(
        listen: SocketAddr,
        root: &Path,
        index: String,
        fallback: Fallback,
    ) -> Result<Self, ConfigError> {
        let root = root.canonicalize().map_err(|source| ConfigError::Root {
            path: root.to_path_buf(),
            source,
        })?;
        if !root.is_dir() {
            return Err(ConfigError::NotADirectory(root));
        }

        if index.is_empty() || index == "." || index == ".." || index.contains(['/', '\\']) {
            return Err(ConfigError::InvalidIndex(index));
        }

        let entry = root.join(&index);
        if !entry.is_file() {
            log::warn!(
                "Entry document {} does not exist, client-side routes will fail",
                entry.display()
            );
        }

        Ok(Self {
            listen,
            root,
            index,
            fallback,
        })
    }

    pub fn entry_document(&self) -> PathBuf {
        self.root.join(&self.index)
    }
}
