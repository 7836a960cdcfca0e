//! Per-program catalog of save files with an auto slot and a bounded set of
//! manual slots.
//!
//! Naming, inside one save directory:
//!
//! - `<base>_auto.<ext>`: the single auto slot, overwritten in place.
//! - `<base>_manual_<epoch-millis>.<ext>`: manual slots, oldest evicted once
//!   the retention limit is reached.
//!
//! The catalog is rebuilt from the directory after every add or remove.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use crate::core::frame::Frame;

use super::codec::{self, CorruptStateError, DecodedState, PersistError};

/// Default file extension for save files.
pub const DEFAULT_EXTENSION: &str = "sav";

/// Default number of manual saves kept per program.
pub const DEFAULT_RETENTION_LIMIT: usize = 10;

const AUTO_SUFFIX: &str = "_auto";
const MANUAL_INFIX: &str = "_manual_";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotKind {
    Auto,
    Manual,
}

/// One save file in the catalog. Identity is the path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaveStateRecord {
    path: PathBuf,
    kind: SlotKind,
    saved_at: SystemTime,
    /// Epoch-millis stamp from a manual slot's name; 0 for the auto slot.
    stamp: u64,
}

impl SaveStateRecord {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> SlotKind {
        self.kind
    }

    /// File modification time.
    pub fn saved_at(&self) -> SystemTime {
        self.saved_at
    }

    /// Read the snapshot and preview from disk.
    pub fn load(&self) -> Result<DecodedState, CorruptStateError> {
        codec::decode(&self.path)
    }

    fn order_key(&self) -> (SystemTime, u64) {
        (self.saved_at, self.stamp)
    }
}

/// Strip directories and a `.gb`/`.gbc` extension from a program path.
pub fn base_title(program_path: &str) -> String {
    let name = program_path
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(program_path);
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".gbc") {
        name[..name.len() - 4].to_string()
    } else if lower.ends_with(".gb") {
        name[..name.len() - 3].to_string()
    } else {
        name.to_string()
    }
}

/// Save catalog for one program image.
#[derive(Debug)]
pub struct SaveStateStore {
    dir: PathBuf,
    base_title: String,
    extension: String,
    /// Newest first.
    catalog: Vec<SaveStateRecord>,
    last_stamp: u64,
}

impl SaveStateStore {
    /// Open (creating if needed) the save directory for `program_path`.
    pub fn open(
        dir: impl Into<PathBuf>,
        program_path: &str,
        extension: &str,
    ) -> Result<Self, PersistError> {
        Self::with_base_title(dir, &base_title(program_path), extension)
    }

    /// Open a store for an explicit base title.
    pub fn with_base_title(
        dir: impl Into<PathBuf>,
        base_title: &str,
        extension: &str,
    ) -> Result<Self, PersistError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| PersistError {
            path: dir.clone(),
            source,
        })?;
        let mut store = Self {
            dir,
            base_title: base_title.to_string(),
            extension: extension.trim_start_matches('.').to_string(),
            catalog: Vec::new(),
            last_stamp: 0,
        };
        store.refresh()?;
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn base_title(&self) -> &str {
        &self.base_title
    }

    /// All records, newest first.
    pub fn records(&self) -> &[SaveStateRecord] {
        &self.catalog
    }

    /// Manual records, newest first.
    pub fn manual_records(&self) -> impl Iterator<Item = &SaveStateRecord> {
        self.catalog.iter().filter(|r| r.kind == SlotKind::Manual)
    }

    pub fn auto_path(&self) -> PathBuf {
        self.dir.join(format!(
            "{}{AUTO_SUFFIX}.{}",
            self.base_title, self.extension
        ))
    }

    /// Rebuild the catalog from the directory listing.
    pub fn enumerate(&mut self) -> io::Result<&[SaveStateRecord]> {
        let mut catalog = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some((kind, stamp)) = self.classify(name) else {
                continue;
            };
            // Files can vanish between listing and stat; skip them.
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            let Ok(saved_at) = metadata.modified() else {
                continue;
            };
            catalog.push(SaveStateRecord {
                path: entry.path(),
                kind,
                saved_at,
                stamp,
            });
        }
        catalog.sort_by(|a, b| b.order_key().cmp(&a.order_key()));
        self.last_stamp = self.last_stamp.max(
            catalog
                .iter()
                .map(|r| r.stamp)
                .max()
                .unwrap_or(0),
        );
        debug!(
            base = %self.base_title,
            count = catalog.len(),
            "save catalog rebuilt"
        );
        self.catalog = catalog;
        Ok(&self.catalog)
    }

    /// Write the auto slot, replacing any previous one.
    pub fn save_auto(&mut self, snapshot: &[u8], preview: &Frame) -> Result<(), PersistError> {
        let path = self.auto_path();
        codec::encode(&path, snapshot, preview)?;
        info!(path = %path.display(), "auto save written");
        self.refresh()
    }

    /// Read the auto slot. A missing or unreadable file yields `None`.
    pub fn load_auto(&self) -> Option<DecodedState> {
        let path = self.auto_path();
        if !path.is_file() {
            debug!(base = %self.base_title, "no auto save");
            return None;
        }
        Self::decode_or_warn(&path)
    }

    /// Write a new manual slot, evicting the oldest manual saves so that at
    /// most `retention_limit` remain. A limit of 0 is treated as 1.
    ///
    /// The new file is written before anything is evicted.
    pub fn save_manual(
        &mut self,
        snapshot: &[u8],
        preview: &Frame,
        retention_limit: usize,
    ) -> Result<PathBuf, PersistError> {
        // Another store on the same directory may have added saves.
        self.refresh()?;
        let limit = retention_limit.max(1);
        let manual: Vec<PathBuf> = self.manual_records().map(|r| r.path.clone()).collect();
        let evict = if manual.len() >= limit {
            manual[limit - 1..].to_vec()
        } else {
            Vec::new()
        };

        let path = self.next_manual_path()?;
        codec::encode(&path, snapshot, preview)?;
        info!(path = %path.display(), "manual save written");

        for old in &evict {
            match fs::remove_file(old) {
                Ok(()) => debug!(path = %old.display(), "evicted manual save"),
                Err(e) => warn!(path = %old.display(), error = %e, "failed to evict manual save"),
            }
        }

        self.refresh()?;
        Ok(path)
    }

    /// The newest manual record, if any.
    pub fn latest_manual_record(&self) -> Option<&SaveStateRecord> {
        self.manual_records().next()
    }

    /// Read the newest manual save. An unreadable file yields `None`.
    pub fn latest_manual(&self) -> Option<DecodedState> {
        let record = self.latest_manual_record()?;
        Self::decode_or_warn(&record.path)
    }

    /// Delete a record's file and drop it from the catalog.
    ///
    /// The catalog entry is dropped even if the file could not be deleted;
    /// the deletion failure is still returned. Unknown records are ignored.
    pub fn remove(&mut self, record: &SaveStateRecord) -> Result<(), PersistError> {
        let Some(index) = self.catalog.iter().position(|r| r.path == record.path) else {
            return Ok(());
        };
        let removed = self.catalog.remove(index);
        match fs::remove_file(&removed.path) {
            Ok(()) => {
                info!(path = %removed.path.display(), "save removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => {
                warn!(path = %removed.path.display(), error = %source, "failed to delete save");
                Err(PersistError {
                    path: removed.path,
                    source,
                })
            }
        }
    }

    fn refresh(&mut self) -> Result<(), PersistError> {
        self.enumerate().map(|_| ()).map_err(|source| PersistError {
            path: self.dir.clone(),
            source,
        })
    }

    /// Pick a manual file name whose stamp is strictly newer than any issued
    /// so far, so two saves in the same millisecond never share a name.
    fn next_manual_path(&mut self) -> Result<PathBuf, PersistError> {
        let mut stamp = epoch_millis().max(self.last_stamp.saturating_add(1));
        loop {
            let path = self.dir.join(format!(
                "{}{MANUAL_INFIX}{stamp}.{}",
                self.base_title, self.extension
            ));
            if !path.exists() {
                self.last_stamp = stamp;
                return Ok(path);
            }
            stamp = stamp.checked_add(1).ok_or_else(|| PersistError {
                path: path.clone(),
                source: io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    "manual save stamps exhausted",
                ),
            })?;
        }
    }

    /// Match a file name against this program's naming scheme.
    fn classify(&self, name: &str) -> Option<(SlotKind, u64)> {
        let stem = name
            .strip_prefix(self.base_title.as_str())?
            .strip_suffix(self.extension.as_str())?
            .strip_suffix('.')?;
        if stem == AUTO_SUFFIX {
            return Some((SlotKind::Auto, 0));
        }
        let digits = stem.strip_prefix(MANUAL_INFIX)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok().map(|stamp| (SlotKind::Manual, stamp))
    }

    fn decode_or_warn(path: &Path) -> Option<DecodedState> {
        match codec::decode(path) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable save");
                None
            }
        }
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_title_strips_known_extensions() {
        assert_eq!(base_title("/roms/Foo.gb"), "Foo");
        assert_eq!(base_title("/roms/Tetris DX.GBC"), "Tetris DX");
        assert_eq!(base_title("C:\\roms\\Zelda.gb"), "Zelda");
        assert_eq!(base_title("demo.bin"), "demo.bin");
        assert_eq!(base_title("Plain"), "Plain");
    }

    #[test]
    fn classify_accepts_only_this_programs_slots() {
        let dir = tempfile::tempdir().unwrap();
        let store = SaveStateStore::with_base_title(dir.path(), "Foo", "sav").unwrap();

        assert_eq!(store.classify("Foo_auto.sav"), Some((SlotKind::Auto, 0)));
        assert_eq!(
            store.classify("Foo_manual_1700000000123.sav"),
            Some((SlotKind::Manual, 1_700_000_000_123))
        );
        assert_eq!(store.classify("FooBar_auto.sav"), None);
        assert_eq!(store.classify("Foo_manual_.sav"), None);
        assert_eq!(store.classify("Foo_manual_12x.sav"), None);
        assert_eq!(store.classify("Foo_auto.sav.tmp"), None);
        assert_eq!(store.classify("Foo_auto.state"), None);
    }

    #[test]
    fn manual_names_are_strictly_increasing() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SaveStateStore::with_base_title(dir.path(), "Foo", "sav").unwrap();
        let a = store.next_manual_path().unwrap();
        let b = store.next_manual_path().unwrap();
        let stamp = |p: &PathBuf| {
            let name = p.file_name().unwrap().to_str().unwrap();
            store.classify(name).unwrap().1
        };
        assert!(stamp(&b) > stamp(&a));
    }

    #[test]
    fn exhausted_stamps_are_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SaveStateStore::with_base_title(dir.path(), "Foo", "sav").unwrap();
        store.last_stamp = u64::MAX - 1;
        fs::write(dir.path().join(format!("Foo_manual_{}.sav", u64::MAX)), b"x").unwrap();
        let err = store.next_manual_path().unwrap_err();
        assert_eq!(err.source.kind(), io::ErrorKind::AlreadyExists);
    }

    #[test]
    fn extension_leading_dot_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = SaveStateStore::with_base_title(dir.path(), "Foo", ".sav").unwrap();
        assert_eq!(store.auto_path(), dir.path().join("Foo_auto.sav"));
    }
}
