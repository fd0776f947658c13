//! Ephemeral document store
//!
//! Immutable PDF blobs keyed by a random [`DocumentId`]. Entries are only ever
//! created or removed, never rewritten, and are reclaimed by [`DocumentStore::sweep`]
//! once they outlive the retention window.
//!
//! Two backends are provided:
//! - [`FsBackend`]: one `{id}.pdf` file per entry under a root directory; the
//!   file's modification time is the entry's creation time
//! - [`MemoryBackend`]: a concurrent map, for tests and single-process use

use std::fmt;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

use crate::error::PageMixError;

/// How many fresh ids `put` tries before giving up on a collision
const MAX_PUT_ATTEMPTS: usize = 4;

/// Prefix of in-flight upload files inside the store root
const STAGING_PREFIX: &str = ".staging-";

/// Opaque identifier of a stored document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DocumentId(Uuid);

impl DocumentId {
    pub fn generate() -> Self {
        DocumentId(Uuid::new_v4())
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for DocumentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(DocumentId)
    }
}

/// A stored document as read back from the store
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub id: DocumentId,
    pub bytes: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of one sweep pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub removed: usize,
}

/// Raw blob persistence behind a [`DocumentStore`]
///
/// Implementations must make `create` and `remove` atomic with respect to
/// `read`: a reader sees either the complete blob or nothing.
pub trait BlobBackend: Send + Sync {
    /// Write a new blob and return its creation time.
    ///
    /// Fails with `ErrorKind::AlreadyExists` if `id` is taken.
    fn create(&self, id: &DocumentId, bytes: &[u8]) -> io::Result<DateTime<Utc>>;

    fn read(&self, id: &DocumentId) -> io::Result<Option<(Vec<u8>, DateTime<Utc>)>>;

    /// Every entry with its creation time
    fn list(&self) -> io::Result<Vec<(DocumentId, DateTime<Utc>)>>;

    /// Returns `false` if the entry was already gone
    fn remove(&self, id: &DocumentId) -> io::Result<bool>;

    /// Delete partial writes abandoned before `cutoff`, returning how many
    fn purge_staging(&self, _cutoff: DateTime<Utc>) -> io::Result<usize> {
        Ok(0)
    }
}

/// Filesystem backend: `{root}/{id}.pdf`
#[derive(Debug)]
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    /// Open (and create if needed) the store root directory
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, id: &DocumentId) -> PathBuf {
        self.root.join(format!("{}.pdf", id))
    }
}

impl BlobBackend for FsBackend {
    fn create(&self, id: &DocumentId, bytes: &[u8]) -> io::Result<DateTime<Utc>> {
        // Stage then link into place so readers never observe a partial file
        let mut staged = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempfile_in(&self.root)?;
        staged.write_all(bytes)?;
        staged.as_file().sync_all()?;

        let file = staged
            .persist_noclobber(self.blob_path(id))
            .map_err(|e| e.error)?;
        let modified = file.metadata()?.modified()?;

        Ok(DateTime::<Utc>::from(modified))
    }

    fn read(&self, id: &DocumentId) -> io::Result<Option<(Vec<u8>, DateTime<Utc>)>> {
        let mut file = match fs::File::open(self.blob_path(id)) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        let modified = file.metadata()?.modified()?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        Ok(Some((bytes, DateTime::<Utc>::from(modified))))
    }

    fn list(&self) -> io::Result<Vec<(DocumentId, DateTime<Utc>)>> {
        let mut entries = Vec::new();

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(id) = file_name
                .to_str()
                .and_then(|name| name.strip_suffix(".pdf"))
                .and_then(|stem| stem.parse::<DocumentId>().ok())
            else {
                continue;
            };

            // Removed concurrently between read_dir and stat
            let modified = match entry.metadata().and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };
            entries.push((id, DateTime::<Utc>::from(modified)));
        }

        Ok(entries)
    }

    fn remove(&self, id: &DocumentId) -> io::Result<bool> {
        match fs::remove_file(self.blob_path(id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn purge_staging(&self, cutoff: DateTime<Utc>) -> io::Result<usize> {
        let mut purged = 0;

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let is_staging = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(STAGING_PREFIX));
            if !is_staging {
                continue;
            }

            let modified = match entry.metadata().and_then(|m| m.modified()) {
                Ok(modified) => DateTime::<Utc>::from(modified),
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };
            if modified >= cutoff {
                continue;
            }

            match fs::remove_file(entry.path()) {
                Ok(()) => purged += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }

        Ok(purged)
    }
}

/// In-memory backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    blobs: DashMap<DocumentId, (Arc<Vec<u8>>, DateTime<Utc>)>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobBackend for MemoryBackend {
    fn create(&self, id: &DocumentId, bytes: &[u8]) -> io::Result<DateTime<Utc>> {
        match self.blobs.entry(*id) {
            Entry::Occupied(_) => Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("document {} already exists", id),
            )),
            Entry::Vacant(slot) => {
                let created_at = Utc::now();
                slot.insert((Arc::new(bytes.to_vec()), created_at));
                Ok(created_at)
            }
        }
    }

    fn read(&self, id: &DocumentId) -> io::Result<Option<(Vec<u8>, DateTime<Utc>)>> {
        Ok(self
            .blobs
            .get(id)
            .map(|entry| (entry.0.as_ref().clone(), entry.1)))
    }

    fn list(&self) -> io::Result<Vec<(DocumentId, DateTime<Utc>)>> {
        Ok(self
            .blobs
            .iter()
            .map(|entry| (*entry.key(), entry.value().1))
            .collect())
    }

    fn remove(&self, id: &DocumentId) -> io::Result<bool> {
        Ok(self.blobs.remove(id).is_some())
    }
}

/// TTL-bound store of canonical PDF bytes
pub struct DocumentStore {
    backend: Box<dyn BlobBackend>,
}

impl fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentStore").finish_non_exhaustive()
    }
}

impl DocumentStore {
    pub fn new(backend: impl BlobBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    /// Store rooted at a directory on disk
    pub fn on_disk(root: impl Into<PathBuf>) -> Result<Self, PageMixError> {
        Ok(Self::new(FsBackend::new(root)?))
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    /// Store `bytes` under a freshly generated id
    pub fn put(&self, bytes: &[u8]) -> Result<DocumentId, PageMixError> {
        for _ in 0..MAX_PUT_ATTEMPTS {
            let id = DocumentId::generate();
            match self.backend.create(&id, bytes) {
                Ok(_) => {
                    tracing::debug!(document_id = %id, size = bytes.len(), "Stored document");
                    return Ok(id);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    tracing::warn!(document_id = %id, "Document id collision, retrying");
                }
                Err(e) => return Err(PageMixError::Storage(e)),
            }
        }

        Err(PageMixError::Storage(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "could not allocate a unique document id",
        )))
    }

    /// Fetch a document; `NotFound` if absent or already reclaimed
    pub fn get(&self, id: &DocumentId) -> Result<StoredDocument, PageMixError> {
        match self.backend.read(id)? {
            Some((bytes, created_at)) => Ok(StoredDocument {
                id: *id,
                bytes,
                created_at,
            }),
            None => Err(PageMixError::NotFound(id.to_string())),
        }
    }

    /// Remove an entry ahead of its expiry
    pub fn remove(&self, id: &DocumentId) -> Result<bool, PageMixError> {
        Ok(self.backend.remove(id)?)
    }

    /// Remove every entry older than `ttl` as of `now`
    ///
    /// Staging files left by interrupted writes are reclaimed under the same
    /// window. A failure to remove one entry is logged and does not stop the
    /// pass.
    pub fn sweep(&self, now: DateTime<Utc>, ttl: Duration) -> Result<SweepReport, PageMixError> {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let mut report = SweepReport::default();

        for (id, created_at) in self.backend.list()? {
            report.scanned += 1;
            if now.signed_duration_since(created_at) <= ttl {
                continue;
            }
            match self.backend.remove(&id) {
                Ok(true) => report.removed += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(document_id = %id, error = %e, "Failed to remove expired document");
                }
            }
        }

        if let Some(cutoff) = now.checked_sub_signed(ttl) {
            match self.backend.purge_staging(cutoff) {
                Ok(0) => {}
                Ok(purged) => tracing::info!(purged, "Removed abandoned staging files"),
                Err(e) => tracing::warn!(error = %e, "Failed to purge staging files"),
            }
        }

        if report.removed > 0 {
            tracing::info!(
                scanned = report.scanned,
                removed = report.removed,
                "Swept expired documents"
            );
        }

        Ok(report)
    }

    /// Ids of all current entries, in no particular order
    pub fn ids(&self) -> Result<Vec<DocumentId>, PageMixError> {
        Ok(self.backend.list()?.into_iter().map(|(id, _)| id).collect())
    }
}
