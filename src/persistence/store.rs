//! Persistence port and its JSON file implementation

use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};
#[cfg(test)]
use std::{collections::HashMap, sync::Mutex};

use tracing::{debug, info, warn};

use super::SessionSnapshot;
use crate::error::PersistenceError;

/// Where a snapshot lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotSlot {
    /// Latest good state, kept across clean exits
    Autosave,
    /// Only consulted at the next startup after an abnormal exit
    Recovery,
}

impl SnapshotSlot {
    pub fn file_name(self) -> &'static str {
        match self {
            SnapshotSlot::Autosave => "autosave.json",
            SnapshotSlot::Recovery => "recovery.json",
        }
    }
}

/// Storage for session snapshots
pub trait SnapshotStore: Send + Sync + 'static {
    /// Replace the slot's content; a failed write leaves the previous copy intact
    fn write(&self, slot: SnapshotSlot, snapshot: &SessionSnapshot) -> Result<(), PersistenceError>;

    /// `Ok(None)` when the slot is empty
    fn read(&self, slot: SnapshotSlot) -> Result<Option<SessionSnapshot>, PersistenceError>;

    /// Removing an empty slot is not an error
    fn remove(&self, slot: SnapshotSlot) -> Result<(), PersistenceError>;

    /// Move an unreadable slot out of the way so it is not offered again
    fn quarantine(&self, slot: SnapshotSlot) -> Result<(), PersistenceError> {
        self.remove(slot)
    }
}

/// Snapshots as pretty-printed JSON files in one directory
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, slot: SnapshotSlot) -> PathBuf {
        self.dir.join(slot.file_name())
    }
}

impl SnapshotStore for JsonFileStore {
    fn write(&self, slot: SnapshotSlot, snapshot: &SessionSnapshot) -> Result<(), PersistenceError> {
        let path = self.path(slot);
        let bytes = serde_json::to_vec_pretty(snapshot).map_err(|e| PersistenceError::json(&path, e))?;
        write_atomic_file(&path, &bytes)?;
        debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    fn read(&self, slot: SnapshotSlot) -> Result<Option<SessionSnapshot>, PersistenceError> {
        let path = self.path(slot);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PersistenceError::io(&path, e)),
        };
        let snapshot: SessionSnapshot =
            serde_json::from_slice(&bytes).map_err(|e| PersistenceError::json(&path, e))?;
        snapshot.validate()?;
        Ok(Some(snapshot))
    }

    fn remove(&self, slot: SnapshotSlot) -> Result<(), PersistenceError> {
        let path = self.path(slot);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!("Removed {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PersistenceError::io(&path, e)),
        }
    }

    fn quarantine(&self, slot: SnapshotSlot) -> Result<(), PersistenceError> {
        let path = self.path(slot);
        let aside = path.with_extension("json.corrupt");
        warn!("Moving unreadable {} to {}", path.display(), aside.display());
        fs::rename(&path, &aside).map_err(|e| PersistenceError::io(&path, e))
    }
}

/// Write to a temp file next to `path`, then rename over it
fn write_atomic_file(path: &Path, bytes: &[u8]) -> Result<(), PersistenceError> {
    let parent = path
        .parent()
        .ok_or_else(|| PersistenceError::Invalid(format!("{} has no parent directory", path.display())))?;
    fs::create_dir_all(parent).map_err(|e| PersistenceError::io(parent, e))?;
    let tmp = parent.join(format!(
        ".{}.tmp.{}",
        path.file_name().and_then(|s| s.to_str()).unwrap_or("snapshot"),
        std::process::id()
    ));
    {
        let mut f = fs::File::create(&tmp).map_err(|e| PersistenceError::io(&tmp, e))?;
        f.write_all(bytes).map_err(|e| PersistenceError::io(&tmp, e))?;
        f.sync_all().map_err(|e| PersistenceError::io(&tmp, e))?;
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(PersistenceError::io(path, e));
    }
    if let Ok(dir) = fs::File::open(parent) {
        let _ = dir.sync_all();
    }
    Ok(())
}

/// In-memory store that counts writes
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<SnapshotSlot, SessionSnapshot>>,
    writes: Mutex<HashMap<SnapshotSlot, usize>>,
    fail_writes: Mutex<bool>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes to `slot`
    pub fn write_count(&self, slot: SnapshotSlot) -> usize {
        self.writes
            .lock()
            .map(|w| w.get(&slot).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn contains(&self, slot: SnapshotSlot) -> bool {
        self.slots.lock().map(|s| s.contains_key(&slot)).unwrap_or(false)
    }

    /// Make subsequent writes fail, as a full disk would
    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut f) = self.fail_writes.lock() {
            *f = failing;
        }
    }

    fn lock_err<T>(e: std::sync::PoisonError<T>) -> PersistenceError {
        PersistenceError::Worker(e.to_string())
    }
}

#[cfg(test)]
impl SnapshotStore for MemoryStore {
    fn write(&self, slot: SnapshotSlot, snapshot: &SessionSnapshot) -> Result<(), PersistenceError> {
        if *self.fail_writes.lock().map_err(Self::lock_err)? {
            return Err(PersistenceError::io(
                slot.file_name(),
                std::io::Error::new(ErrorKind::Other, "no space left on device"),
            ));
        }
        self.slots.lock().map_err(Self::lock_err)?.insert(slot, snapshot.clone());
        *self.writes.lock().map_err(Self::lock_err)?.entry(slot).or_default() += 1;
        Ok(())
    }

    fn read(&self, slot: SnapshotSlot) -> Result<Option<SessionSnapshot>, PersistenceError> {
        Ok(self.slots.lock().map_err(Self::lock_err)?.get(&slot).cloned())
    }

    fn remove(&self, slot: SnapshotSlot) -> Result<(), PersistenceError> {
        self.slots.lock().map_err(Self::lock_err)?.remove(&slot);
        Ok(())
    }
}
