//! Named exclusive locks.
//!
//! [`LockTable`] maps a resource name (`post_<id>`, `posts_index`, ...) to a
//! slot holding a `held` flag and a condition variable. A slot exists only
//! while some thread holds or waits for it, so the table never grows with
//! the number of resources ever touched.
//!
//! In [`LockMode::MultiProcess`] the holder additionally takes an OS
//! advisory lock on `.locks/<name>.lock` after winning the in-process slot.
//! Those files are left in place: removing a lock file another process may
//! have open would let two processes lock different inodes under one name.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use fs2::FileExt;
use tracing::debug;

use crate::config::LockMode;
use crate::error::{StoreError, StoreResult};

struct Slot {
    held: bool,
    /// Holder plus waiters.
    users: usize,
    released: Arc<Condvar>,
}

impl Slot {
    fn new() -> Self {
        Self {
            held: false,
            users: 0,
            released: Arc::new(Condvar::new()),
        }
    }
}

/// Table of named, blocking, exclusive locks.
pub struct LockTable {
    slots: Mutex<HashMap<String, Slot>>,
    /// Set in multi-process mode.
    file_dir: Option<PathBuf>,
}

impl LockTable {
    pub fn new(mode: LockMode, locks_dir: impl Into<PathBuf>) -> Self {
        let file_dir = match mode {
            LockMode::InProcess => None,
            LockMode::MultiProcess => Some(locks_dir.into()),
        };
        Self {
            slots: Mutex::new(HashMap::new()),
            file_dir,
        }
    }

    /// An in-process-only table, for tests and embedding.
    pub fn in_process() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            file_dir: None,
        }
    }

    /// Block until `name` is free, then hold it until the guard drops.
    ///
    /// There is no timeout and no fairness beyond what the OS scheduler
    /// provides.
    pub fn acquire(&self, name: &str) -> StoreResult<ResourceGuard<'_>> {
        {
            let mut slots = self.slots.lock().map_err(|_| StoreError::LockPoisoned)?;
            let released = {
                let slot = slots.entry(name.to_string()).or_insert_with(Slot::new);
                slot.users += 1;
                Arc::clone(&slot.released)
            };
            while slots.get(name).is_some_and(|s| s.held) {
                slots = released.wait(slots).map_err(|_| StoreError::LockPoisoned)?;
            }
            if let Some(slot) = slots.get_mut(name) {
                slot.held = true;
            }
        }

        // From here on the guard owns the slot; an early return releases it.
        let mut guard = ResourceGuard {
            table: self,
            name: name.to_string(),
            file: None,
        };
        if let Some(dir) = &self.file_dir {
            let file = open_lock_file(dir, name)?;
            file.lock_exclusive()?;
            guard.file = Some(file);
        }
        debug!(resource = name, "lock acquired");
        Ok(guard)
    }

    /// Number of names currently held or waited on.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, name: &str) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let reclaim = match slots.get_mut(name) {
            Some(slot) => {
                slot.held = false;
                slot.users -= 1;
                if slot.users > 0 {
                    slot.released.notify_one();
                }
                slot.users == 0
            }
            None => false,
        };
        if reclaim {
            slots.remove(name);
        }
    }
}

impl std::fmt::Debug for LockTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockTable")
            .field("active", &self.len())
            .field("file_dir", &self.file_dir)
            .finish()
    }
}

/// Holds one named lock. Dropping it releases the lock.
pub struct ResourceGuard<'a> {
    table: &'a LockTable,
    name: String,
    file: Option<File>,
}

impl ResourceGuard<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Release explicitly. Equivalent to dropping the guard.
    pub fn release(self) {}
}

impl Drop for ResourceGuard<'_> {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
        }
        self.table.release(&self.name);
        debug!(resource = %self.name, "lock released");
    }
}

impl std::fmt::Debug for ResourceGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceGuard")
            .field("name", &self.name)
            .field("file_locked", &self.file.is_some())
            .finish()
    }
}

fn open_lock_file(dir: &Path, name: &str) -> StoreResult<File> {
    fs::create_dir_all(dir)?;
    let file_name: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(dir.join(format!("{file_name}.lock")))?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn same_name_is_exclusive() {
        let table = Arc::new(LockTable::in_process());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let table = Arc::clone(&table);
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                thread::spawn(move || {
                    for _ in 0..10 {
                        let _guard = table.acquire("post_1").unwrap();
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_micros(200));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert!(table.is_empty());
    }

    #[test]
    fn different_names_do_not_block() {
        let table = LockTable::in_process();
        let a = table.acquire("post_a").unwrap();
        let b = table.acquire("post_b").unwrap();
        assert_eq!(table.len(), 2);
        drop(a);
        drop(b);
        assert!(table.is_empty());
    }

    #[test]
    fn slots_are_reclaimed_after_release() {
        let table = LockTable::in_process();
        for i in 0..100 {
            let guard = table.acquire(&format!("post_{i}")).unwrap();
            guard.release();
        }
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn waiter_gets_lock_after_holder_drops() {
        let table = Arc::new(LockTable::in_process());
        let guard = table.acquire("agents_index").unwrap();

        let waiter = {
            let table = Arc::clone(&table);
            thread::spawn(move || {
                let g = table.acquire("agents_index").unwrap();
                g.name().to_string()
            })
        };
        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());
        drop(guard);
        assert_eq!(waiter.join().unwrap(), "agents_index");
        assert!(table.is_empty());
    }

    #[test]
    fn multi_process_mode_locks_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let locks = dir.path().join(".locks");
        let table = LockTable::new(LockMode::MultiProcess, &locks);

        let guard = table.acquire("post_x").unwrap();
        assert!(locks.join("post_x.lock").is_file());

        // A second descriptor on the same file cannot take the lock meanwhile.
        let other = File::open(locks.join("post_x.lock")).unwrap();
        assert!(other.try_lock_exclusive().is_err());
        drop(guard);
        assert!(other.try_lock_exclusive().is_ok());
        other.unlock().unwrap();
    }
}
