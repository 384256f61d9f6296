//! Directory-backed snapshot store.
//!
//! Each key maps to one file named after the BLAKE3 hash of the key, so
//! arbitrary identity strings never leak into paths. Every write goes to its
//! own sibling temp file and is renamed into place; a reader sees either the
//! old snapshot or a complete new one, and overlapping writers of one key
//! never share a temp file. The last rename wins.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::debug;

use crate::error::StoreResult;
use crate::traits::{AsyncSnapshotStore, SnapshotStore};

const SNAPSHOT_EXTENSION: &str = "snapshot";
const TEMP_EXTENSION: &str = "tmp";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A [`SnapshotStore`] that keeps one file per key under a root directory.
#[derive(Clone, Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        debug!(root = %root.display(), "opened file snapshot store");
        Ok(Self { root })
    }

    /// The directory holding the snapshot files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file backing `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let digest = blake3::hash(key.as_bytes());
        self.root
            .join(format!("{}.{SNAPSHOT_EXTENSION}", hex::encode(digest.as_bytes())))
    }

    /// A temp path unique to this process and this write.
    fn temp_path_for(&self, key: &str) -> PathBuf {
        let unique = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut name = self.path_for(key).into_os_string();
        name.push(format!(".{}.{unique}.{TEMP_EXTENSION}", std::process::id()));
        PathBuf::from(name)
    }
}

/// Remove a temp file left behind by a failed write.
fn discard_temp<T>(temp: &Path, result: io::Result<T>) -> StoreResult<T> {
    result.map_err(|e| {
        let _ = fs::remove_file(temp);
        e.into()
    })
}

fn not_found_as_none(result: io::Result<Vec<u8>>) -> StoreResult<Option<Vec<u8>>> {
    match result {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl SnapshotStore for FileStore {
    fn fetch(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        not_found_as_none(fs::read(self.path_for(key)))
    }

    fn persist(&self, key: &str, snapshot: &[u8]) -> StoreResult<()> {
        let temp = self.temp_path_for(key);
        discard_temp(&temp, fs::write(&temp, snapshot))?;
        discard_temp(&temp, fs::rename(&temp, self.path_for(key)))
    }
}

#[async_trait]
impl AsyncSnapshotStore for FileStore {
    async fn fetch(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        not_found_as_none(tokio::fs::read(self.path_for(key)).await)
    }

    async fn persist(&self, key: &str, snapshot: &[u8]) -> StoreResult<()> {
        let temp = self.temp_path_for(key);
        discard_temp(&temp, tokio::fs::write(&temp, snapshot).await)?;
        discard_temp(&temp, tokio::fs::rename(&temp, self.path_for(key)).await)
    }
}
