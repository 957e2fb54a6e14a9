use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::lock::{LockTable, ResourceGuard};

pub const POSTS_DIR: &str = "posts";
pub const AGENTS_DIR: &str = "agents";
pub const INDEX_DIR: &str = "index";
pub const LOCKS_DIR: &str = ".locks";

/// Filesystem-backed storage rooted at one data directory.
///
/// Every write goes to a temporary sibling file that is renamed over the
/// target, so readers see either the old or the new content. Writing two
/// files is two independent commits; a crash in between leaves one updated
/// and the other stale.
pub struct FileStorage {
    root: PathBuf,
    posts_dir: PathBuf,
    agents_dir: PathBuf,
    index_dir: PathBuf,
    locks_dir: PathBuf,
    fsync: bool,
    locks: LockTable,
}

impl FileStorage {
    /// Open (creating if needed) the layout under `config.data_root`.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        let root = config.data_root.clone();
        let posts_dir = root.join(POSTS_DIR);
        let agents_dir = root.join(AGENTS_DIR);
        let index_dir = root.join(INDEX_DIR);
        let locks_dir = root.join(LOCKS_DIR);
        for dir in [&posts_dir, &agents_dir, &index_dir, &locks_dir] {
            fs::create_dir_all(dir)?;
        }
        info!(root = %root.display(), lock_mode = ?config.lock_mode, "storage opened");

        Ok(Self {
            locks: LockTable::new(config.lock_mode, &locks_dir),
            root,
            posts_dir,
            agents_dir,
            index_dir,
            locks_dir,
            fsync: config.fsync,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn posts_dir(&self) -> &Path {
        &self.posts_dir
    }

    pub fn agents_dir(&self) -> &Path {
        &self.agents_dir
    }

    pub fn index_dir(&self) -> &Path {
        &self.index_dir
    }

    pub fn locks_dir(&self) -> &Path {
        &self.locks_dir
    }

    pub fn locks(&self) -> &LockTable {
        &self.locks
    }

    /// Take the named resource lock. See [`LockTable::acquire`].
    pub fn lock(&self, name: &str) -> StoreResult<ResourceGuard<'_>> {
        self.locks.acquire(name)
    }

    // ---------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------

    pub fn read_bytes(&self, path: &Path) -> StoreResult<Vec<u8>> {
        fs::read(path).map_err(|e| not_found_or_io(e, path))
    }

    pub fn read_text(&self, path: &Path) -> StoreResult<String> {
        fs::read_to_string(path).map_err(|e| not_found_or_io(e, path))
    }

    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> StoreResult<T> {
        let bytes = self.read_bytes(path)?;
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Serialization {
            path: path.to_path_buf(),
            source,
        })
    }

    // ---------------------------------------------------------------
    // Writes
    // ---------------------------------------------------------------

    /// Write `bytes` to a temp file beside `path` without touching `path`.
    ///
    /// Nothing is visible at `path` until [`StagedWrite::commit`]. Dropping
    /// the staged write discards the temp file.
    pub fn stage(&self, path: &Path, bytes: &[u8]) -> StoreResult<StagedWrite> {
        let parent = path.parent().ok_or_else(|| {
            StoreError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} has no parent directory", path.display()),
            ))
        })?;
        fs::create_dir_all(parent)?;

        let mut temp = NamedTempFile::new_in(parent)?;
        temp.write_all(bytes)?;
        if self.fsync {
            temp.as_file().sync_all()?;
        }
        Ok(StagedWrite {
            temp,
            target: path.to_path_buf(),
            fsync: self.fsync,
        })
    }

    /// Atomically replace `path` with `bytes`.
    pub fn write_bytes(&self, path: &Path, bytes: &[u8]) -> StoreResult<()> {
        self.stage(path, bytes)?.commit()
    }

    pub fn write_text(&self, path: &Path, text: &str) -> StoreResult<()> {
        self.write_bytes(path, text.as_bytes())
    }

    /// Atomically replace `path` with pretty-printed JSON.
    pub fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> StoreResult<()> {
        let bytes = encode_json(path, value)?;
        self.write_bytes(path, &bytes)
    }

    /// Write JSON to `path` only if nothing is there yet.
    ///
    /// The check and the create are one filesystem operation, so two racing
    /// creators cannot both succeed.
    pub fn create_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> StoreResult<()> {
        let bytes = encode_json(path, value)?;
        self.stage(path, &bytes)?.commit_new()
    }

    /// Create `path` as a new directory, failing if it already exists.
    pub fn create_dir_exclusive(&self, path: &Path) -> StoreResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::create_dir(path).map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => StoreError::AlreadyExists(path.to_path_buf()),
            _ => StoreError::Io(e),
        })
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    pub fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    pub fn dir_exists(&self, path: &Path) -> bool {
        path.is_dir()
    }

    /// Immediate subdirectories of `dir`, sorted by name. A missing `dir`
    /// lists as empty.
    pub fn list_subdirectories(&self, dir: &Path) -> StoreResult<Vec<PathBuf>> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut dirs = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                dirs.push(entry.path());
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    /// Remove a directory tree. Returns `true` if it existed.
    ///
    /// Normal delete flows are soft deletes and never call this.
    pub fn delete_directory(&self, path: &Path) -> StoreResult<bool> {
        match fs::remove_dir_all(path) {
            Ok(()) => {
                debug!(path = %path.display(), "directory removed");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

impl std::fmt::Debug for FileStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStorage")
            .field("root", &self.root)
            .field("fsync", &self.fsync)
            .field("locks", &self.locks)
            .finish()
    }
}

/// A fully written temp file waiting to be renamed over its target.
pub struct StagedWrite {
    temp: NamedTempFile,
    target: PathBuf,
    fsync: bool,
}

impl StagedWrite {
    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    /// Rename over the target, replacing any previous content.
    pub fn commit(self) -> StoreResult<()> {
        let Self { temp, target, fsync } = self;
        temp.persist(&target).map_err(|e| StoreError::Io(e.error))?;
        sync_parent(&target, fsync);
        debug!(path = %target.display(), "write committed");
        Ok(())
    }

    /// Rename over the target only if the target does not exist.
    pub fn commit_new(self) -> StoreResult<()> {
        let Self { temp, target, fsync } = self;
        temp.persist_noclobber(&target).map_err(|e| match e.error.kind() {
            io::ErrorKind::AlreadyExists => StoreError::AlreadyExists(target.clone()),
            _ => StoreError::Io(e.error),
        })?;
        sync_parent(&target, fsync);
        debug!(path = %target.display(), "exclusive write committed");
        Ok(())
    }
}

impl std::fmt::Debug for StagedWrite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagedWrite")
            .field("target", &self.target)
            .field("temp", &self.temp.path())
            .finish()
    }
}

fn encode_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> StoreResult<Vec<u8>> {
    serde_json::to_vec_pretty(value).map_err(|source| StoreError::Serialization {
        path: path.to_path_buf(),
        source,
    })
}

fn not_found_or_io(err: io::Error, path: &Path) -> StoreError {
    if err.kind() == io::ErrorKind::NotFound {
        StoreError::NotFound(path.to_path_buf())
    } else {
        StoreError::Io(err)
    }
}

fn sync_parent(target: &Path, fsync: bool) {
    #[cfg(unix)]
    if fsync {
        if let Some(parent) = target.parent() {
            if let Ok(dir) = fs::File::open(parent) {
                let _ = dir.sync_all();
            }
        }
    }
    #[cfg(not(unix))]
    let _ = (target, fsync);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn open_temp() -> (tempfile::TempDir, FileStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(&StoreConfig::at(dir.path())).unwrap();
        (dir, storage)
    }

    fn files_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn open_creates_layout() {
        let (dir, storage) = open_temp();
        for sub in [POSTS_DIR, AGENTS_DIR, INDEX_DIR, LOCKS_DIR] {
            assert!(dir.path().join(sub).is_dir(), "{sub} missing");
        }
        assert_eq!(storage.root(), dir.path());
    }

    #[test]
    fn json_round_trip_is_pretty_and_unescaped() {
        let (_dir, storage) = open_temp();
        let path = storage.posts_dir().join("p").join("metadata.json");
        storage.write_json(&path, &json!({"title": "héllo"})).unwrap();

        let raw = storage.read_text(&path).unwrap();
        assert_eq!(raw, "{\n  \"title\": \"héllo\"\n}");
        let value: serde_json::Value = storage.read_json(&path).unwrap();
        assert_eq!(value["title"], "héllo");
    }

    #[test]
    fn missing_file_is_not_found() {
        let (_dir, storage) = open_temp();
        let err = storage.read_text(&storage.root().join("nope.md")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn malformed_json_is_a_serialization_error() {
        let (_dir, storage) = open_temp();
        let path = storage.root().join("bad.json");
        storage.write_text(&path, "{not json").unwrap();
        let err = storage.read_json::<serde_json::Value>(&path).unwrap_err();
        assert!(matches!(err, StoreError::Serialization { .. }));
    }

    #[test]
    fn fault_before_rename_leaves_original_intact() {
        let (_dir, storage) = open_temp();
        let dir = storage.posts_dir().join("p");
        let path = dir.join("content.md");
        storage.write_text(&path, "original body").unwrap();
        let before = storage.read_bytes(&path).unwrap();

        let staged = storage.stage(&path, b"replacement that never lands").unwrap();
        assert!(staged.temp_path().is_file());
        // Simulated crash: the staged write is abandoned, never committed.
        drop(staged);

        assert_eq!(storage.read_bytes(&path).unwrap(), before);
        assert_eq!(files_in(&dir), vec!["content.md".to_string()]);
    }

    #[test]
    fn commit_replaces_content() {
        let (_dir, storage) = open_temp();
        let path = storage.root().join("x.md");
        storage.write_text(&path, "one").unwrap();
        storage.write_text(&path, "two").unwrap();
        assert_eq!(storage.read_text(&path).unwrap(), "two");
    }

    #[test]
    fn create_json_refuses_to_clobber() {
        let (_dir, storage) = open_temp();
        let path = storage.agents_dir().join("alice").join("profile.json");
        storage.create_json(&path, &json!({"v": 1})).unwrap();

        let err = storage.create_json(&path, &json!({"v": 2})).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
        let kept: serde_json::Value = storage.read_json(&path).unwrap();
        assert_eq!(kept["v"], 1);
        assert_eq!(files_in(path.parent().unwrap()), vec!["profile.json".to_string()]);
    }

    #[test]
    fn create_dir_exclusive_detects_duplicates() {
        let (_dir, storage) = open_temp();
        let path = storage.posts_dir().join("post_1_aaaaaaaa");
        storage.create_dir_exclusive(&path).unwrap();
        assert!(matches!(
            storage.create_dir_exclusive(&path),
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[test]
    fn list_subdirectories_skips_files_and_missing_dirs() {
        let (_dir, storage) = open_temp();
        let posts = storage.posts_dir();
        fs::create_dir(posts.join("b")).unwrap();
        fs::create_dir(posts.join("a")).unwrap();
        fs::write(posts.join("stray.txt"), "x").unwrap();

        let listed = storage.list_subdirectories(posts).unwrap();
        assert_eq!(listed, vec![posts.join("a"), posts.join("b")]);
        assert!(storage
            .list_subdirectories(&posts.join("missing"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn delete_directory_reports_existence() {
        let (_dir, storage) = open_temp();
        let path = storage.posts_dir().join("gone");
        storage.write_text(&path.join("content.md"), "x").unwrap();
        assert!(storage.delete_directory(&path).unwrap());
        assert!(!storage.dir_exists(&path));
        assert!(!storage.delete_directory(&path).unwrap());
    }
}
