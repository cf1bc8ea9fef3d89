use crate::config::Config;
use percent_encoding::percent_decode_str;
use std::path::{Path, PathBuf};
use tokio::fs;

/// When a missing path is answered with the entry document.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fallback {
    /// Only for paths whose last segment has no extension; missing assets are 404s.
    Extension,
    /// For every missing path.
    Always,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Kind {
    /// The request named this file (or a directory holding the entry document).
    File,
    /// Nothing matched, so the entry document stands in for a client-side route.
    Fallback,
}

#[derive(Debug)]
pub struct Resolved {
    pub path: PathBuf,
    pub kind: Kind,
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("entry document {} is missing", .0.display())]
    MissingIndex(PathBuf),
}

pub async fn resolve(config: &Config, request_path: &str) -> Result<Resolved, ResolveError> {
    let path = strip_query(request_path);
    let Segments { names, on_disk } = split_segments(path);

    // names that can't be files still get a chance at the fallback
    if on_disk {
        let candidate = names
            .iter()
            .fold(config.root.clone(), |acc, name| acc.join(name));
        if let Some(found) = existing_file(&config.root, candidate, &config.index).await {
            return Ok(Resolved {
                path: found,
                kind: Kind::File,
            });
        }
    }

    if config.fallback == Fallback::Extension {
        if let Some(last) = names.last() {
            if has_extension(last) && *last != config.index {
                return Err(ResolveError::NotFound(path.to_string()));
            }
        }
    }

    let entry = config.entry_document();
    match fs::metadata(&entry).await {
        Ok(meta) if meta.is_file() => Ok(Resolved {
            path: entry,
            kind: Kind::Fallback,
        }),
        _ => Err(ResolveError::MissingIndex(entry)),
    }
}

fn strip_query(path: &str) -> &str {
    match path.find(['?', '#']) {
        Some(i) => &path[..i],
        None => path,
    }
}

struct Segments {
    names: Vec<String>,
    /// Whether `names` can be looked up on disk at all.
    on_disk: bool,
}

/// Splits a request path into segments that stay under the root.
/// `..` can never climb, so it is dropped along with empty and `.` segments.
fn split_segments(path: &str) -> Segments {
    let decoded = percent_decode_str(path);
    let valid_utf8 = decoded.clone().decode_utf8().is_ok();
    let names = decoded
        .decode_utf8_lossy()
        .split(['/', '\\'])
        .filter(|name| !matches!(*name, "" | "." | ".."))
        .map(str::to_string)
        .collect::<Vec<_>>();
    let on_disk = valid_utf8 && names.iter().all(|name| is_file_name(name));
    Segments { names, on_disk }
}

fn is_file_name(name: &str) -> bool {
    // drive letters and alternate data streams
    !name.contains('\0') && !(cfg!(windows) && name.contains(':'))
}

fn has_extension(segment: &str) -> bool {
    segment.rfind('.').is_some_and(|i| i > 0)
}

async fn existing_file(root: &Path, candidate: PathBuf, index: &str) -> Option<PathBuf> {
    let meta = fs::metadata(&candidate).await.ok()?;
    let file = if meta.is_file() {
        candidate
    } else if meta.is_dir() {
        let inner = candidate.join(index);
        if !fs::metadata(&inner).await.ok()?.is_file() {
            return None;
        }
        inner
    } else {
        return None;
    };

    // symlinks may point anywhere
    let canonical = fs::canonicalize(&file).await.ok()?;
    if canonical.starts_with(root) {
        Some(file)
    } else {
        log::warn!(
            "Refusing {} -> {} (outside of root)",
            file.display(),
            canonical.display()
        );
        None
    }
}
