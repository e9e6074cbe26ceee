//! Persistent record of already-processed article URLs.
//!
//! The store is loaded once at startup from a newline-delimited file and
//! shared across every concurrent fetch task. Its one hard requirement is
//! the atomic check-and-mark: two tasks racing on the same URL must never
//! both be told "not seen before". Everything else is forgiving: a missing
//! or unreadable file starts an empty set, and a failed write degrades
//! future dedup accuracy without touching the current run.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Process-wide set of processed URLs, backed by a plain text file.
#[derive(Debug)]
pub struct DedupStore {
    path: PathBuf,
    urls: Mutex<HashSet<String>>,
}

impl DedupStore {
    /// Load the set persisted at `path`.
    ///
    /// Missing or unreadable files are not errors; the store starts empty
    /// and the condition is logged. Lines are trimmed and blank lines
    /// ignored.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let urls = match fs::read_to_string(&path).await {
            Ok(body) => {
                let set: HashSet<String> = body
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(String::from)
                    .collect();
                info!(count = set.len(), path = %path.display(), "Loaded processed URL set");
                set
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No processed URL file yet; starting empty");
                HashSet::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read processed URL file; starting empty");
                HashSet::new()
            }
        };

        Self {
            path,
            urls: Mutex::new(urls),
        }
    }

    /// In-memory store rooted at `path` with `seed` URLs pre-marked.
    #[cfg(test)]
    pub fn with_urls(path: impl Into<PathBuf>, seed: impl IntoIterator<Item = String>) -> Self {
        Self {
            path: path.into(),
            urls: Mutex::new(seed.into_iter().collect()),
        }
    }

    /// Whether `url` has already been processed. Production code goes
    /// through [`DedupStore::try_mark`] instead of checking first.
    #[cfg(test)]
    pub async fn contains(&self, url: &str) -> bool {
        self.urls.lock().await.contains(url)
    }

    /// Atomically check and mark `url` as processed.
    ///
    /// Returns `true` when the URL was newly marked, meaning the caller now
    /// owns fetching it. Returns `false` when it was already present. The
    /// check and the insert happen under one lock, so concurrent callers
    /// racing on the same URL get exactly one `true` between them. Marking
    /// is idempotent.
    pub async fn try_mark(&self, url: &str) -> bool {
        self.urls.lock().await.insert(url.to_string())
    }

    /// Number of processed URLs currently held.
    pub async fn len(&self) -> usize {
        self.urls.lock().await.len()
    }

    /// Durably write the current set, one URL per line.
    ///
    /// Call sites treat failure as a logged degradation, never as fatal.
    pub async fn persist(&self) -> io::Result<()> {
        let snapshot: Vec<String> = {
            let urls = self.urls.lock().await;
            urls.iter().cloned().collect()
        };
        let mut body = snapshot.join("\n");
        if !body.is_empty() {
            body.push('\n');
        }
        fs::write(&self.path, body).await?;
        info!(count = snapshot.len(), path = %self.path.display(), "Persisted processed URL set");
        Ok(())
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
