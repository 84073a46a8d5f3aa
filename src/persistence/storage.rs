//! Filesystem side of persistence: atomic slot writes, document reads and
//! directory discovery.
//!
//! Writes go to `{path}.tmp`, are flushed and synced, then renamed over the
//! target. A crash at any point leaves either the previous file or the new
//! one, plus possibly an orphaned temp file that discovery resolves.

use super::document::{peek_metadata, SaveDocument, SaveMetadata};
use super::slots::{SaveSlotInfo, SlotNaming};
use crate::constants::persistence::TEMP_SUFFIX;
use crate::error::PersistenceError;
use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Write `bytes` to `path` through a synced temp file
pub fn write_atomic(path: &Path, bytes: &[u8]) -> PersistenceResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| PersistenceError::io("create_directory", parent, e))?;
    }

    let temp_path = SlotNaming::temp_path(path);
    if let Err(error) = write_synced(&temp_path, bytes) {
        let _ = fs::remove_file(&temp_path);
        return Err(error);
    }

    // rename does not replace existing files on every platform
    if path.exists() {
        fs::remove_file(path).map_err(|e| PersistenceError::io("replace", path, e))?;
    }
    fs::rename(&temp_path, path).map_err(|e| PersistenceError::io("rename", &temp_path, e))?;
    Ok(())
}

fn write_synced(path: &Path, bytes: &[u8]) -> PersistenceResult<()> {
    let file = File::create(path).map_err(|e| PersistenceError::io("create", path, e))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(bytes)
        .map_err(|e| PersistenceError::io("write", path, e))?;
    writer
        .flush()
        .map_err(|e| PersistenceError::io("flush", path, e))?;
    writer
        .get_mut()
        .sync_all()
        .map_err(|e| PersistenceError::io("sync", path, e))?;
    Ok(())
}

pub fn read_document(path: &Path) -> PersistenceResult<SaveDocument> {
    let bytes = fs::read(path).map_err(|e| PersistenceError::io("read", path, e))?;
    SaveDocument::from_slice(&bytes).map_err(|e| PersistenceError::serialization(path, e))
}

/// Size and modification time of a committed slot file
pub fn file_stats(path: &Path) -> PersistenceResult<(u64, DateTime<Utc>)> {
    let meta = fs::metadata(path).map_err(|e| PersistenceError::io("stat", path, e))?;
    let modified = meta
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());
    Ok((meta.len(), modified))
}

/// Stream the metadata header out of a slot file without buffering payloads
pub fn read_metadata(path: &Path) -> PersistenceResult<SaveMetadata> {
    let file = File::open(path).map_err(|e| PersistenceError::io("read", path, e))?;
    peek_metadata(BufReader::new(file))
        .map_err(|e| PersistenceError::serialization(path, e))
}

/// Build a catalog entry from a slot file, reading only its metadata header.
/// Files whose header cannot be parsed are still listed, without metadata.
pub fn describe_slot(path: &Path, slot: u32, is_auto_save: bool) -> PersistenceResult<SaveSlotInfo> {
    let (size, modified) = file_stats(path)?;
    let info = SaveSlotInfo::new(slot, path.to_path_buf(), modified, size, is_auto_save);
    match read_metadata(path) {
        Ok(metadata) => Ok(info.with_metadata(&metadata)),
        Err(error @ PersistenceError::SerializationFailure { .. }) => {
            warn!(path = %path.display(), error = %error, "Save slot metadata unreadable");
            Ok(info)
        }
        Err(error) => Err(error),
    }
}

/// Scan `directory` for slot files, resolving orphaned temp files first.
///
/// A complete temp file whose target is missing is promoted (the crash
/// happened between delete and rename). A temp file that does not parse was
/// cut short mid-write and is discarded, as is one whose target exists.
pub fn discover_slots(directory: &Path, naming: &SlotNaming) -> PersistenceResult<Vec<SaveSlotInfo>> {
    if !directory.exists() {
        return Ok(Vec::new());
    }

    recover_temp_files(directory, naming)?;

    let mut slots = Vec::new();
    for path in list_files(directory)? {
        let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        let Some((slot, is_auto_save)) = naming.parse_file_name(file_name) else {
            continue;
        };
        match describe_slot(&path, slot, is_auto_save) {
            Ok(info) => slots.push(info),
            Err(error) => warn!(path = %path.display(), error = %error, "Skipping unreadable save slot"),
        }
    }
    slots.sort_by_key(|info| info.slot_number);
    debug!(directory = %directory.display(), count = slots.len(), "Discovered save slots");
    Ok(slots)
}

fn recover_temp_files(directory: &Path, naming: &SlotNaming) -> PersistenceResult<()> {
    for temp_path in list_files(directory)? {
        let Some(file_name) = temp_path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        let Some(target_name) = file_name.strip_suffix(TEMP_SUFFIX) else {
            continue;
        };
        if naming.parse_file_name(target_name).is_none() {
            continue;
        }

        let target = directory.join(target_name);
        if target.exists() {
            fs::remove_file(&temp_path)
                .map_err(|e| PersistenceError::io("remove_temp", &temp_path, e))?;
            debug!(path = %temp_path.display(), "Removed stale temp file");
        } else if let Err(error) = read_metadata(&temp_path) {
            warn!(
                path = %temp_path.display(),
                error = %error,
                "Discarding incomplete temp file"
            );
            fs::remove_file(&temp_path)
                .map_err(|e| PersistenceError::io("remove_temp", &temp_path, e))?;
        } else {
            fs::rename(&temp_path, &target)
                .map_err(|e| PersistenceError::io("recover_temp", &temp_path, e))?;
            info!(path = %target.display(), "Recovered interrupted save from temp file");
        }
    }
    Ok(())
}

fn list_files(directory: &Path) -> PersistenceResult<Vec<PathBuf>> {
    let entries =
        fs::read_dir(directory).map_err(|e| PersistenceError::io("list", directory, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| PersistenceError::io("list", directory, e))?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::document::SaveMetadata;
    use tempfile::TempDir;

    fn document(slot: u32) -> SaveDocument {
        SaveDocument::new(SaveMetadata {
            slot_number: slot,
            description: format!("slot {slot}"),
            save_time: Utc::now(),
            version: "0.1.0".to_string(),
            play_time_seconds: 0.0,
            is_auto_save: false,
        })
    }

    #[test]
    fn test_write_atomic_replaces_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("SaveGame_0001.json");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
        assert!(!SlotNaming::temp_path(&path).exists());
    }

    #[test]
    fn test_orphaned_temp_is_promoted_when_target_missing() {
        let dir = TempDir::new().unwrap();
        let naming = SlotNaming::new("SaveGame_", ".json", 3);
        let target = naming.path_for(dir.path(), 2, false);
        let bytes = document(2).to_bytes(false).unwrap();
        fs::write(SlotNaming::temp_path(&target), bytes).unwrap();

        let slots = discover_slots(dir.path(), &naming).unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].slot_number, 2);
        assert!(target.exists());
    }

    #[test]
    fn test_truncated_temp_is_discarded() {
        let dir = TempDir::new().unwrap();
        let naming = SlotNaming::new("SaveGame_", ".json", 3);
        let target = naming.path_for(dir.path(), 3, false);
        let temp = SlotNaming::temp_path(&target);
        fs::write(&temp, br#"{"Metadata": {"Slot"#).unwrap();

        let slots = discover_slots(dir.path(), &naming).unwrap();
        assert!(slots.is_empty());
        assert!(!temp.exists());
        assert!(!target.exists());
    }

    #[test]
    fn test_stale_temp_is_removed_when_target_exists() {
        let dir = TempDir::new().unwrap();
        let naming = SlotNaming::new("SaveGame_", ".json", 3);
        let target = naming.path_for(dir.path(), 3, false);
        write_atomic(&target, &document(3).to_bytes(false).unwrap()).unwrap();
        let temp = SlotNaming::temp_path(&target);
        fs::write(&temp, b"partial").unwrap();

        let slots = discover_slots(dir.path(), &naming).unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].description.as_deref(), Some("slot 3"));
        assert!(!temp.exists());
    }

    #[test]
    fn test_discovery_ignores_foreign_files() {
        let dir = TempDir::new().unwrap();
        let naming = SlotNaming::new("SaveGame_", ".json", 3);
        fs::write(dir.path().join("notes.txt"), b"hello").unwrap();
        fs::write(dir.path().join("SaveGame_abc.json"), b"{}").unwrap();
        assert!(discover_slots(dir.path(), &naming).unwrap().is_empty());
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let naming = SlotNaming::new("SaveGame_", ".json", 3);
        let missing = dir.path().join("nope");
        assert!(discover_slots(&missing, &naming).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_fails_to_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("SaveGame_0001.json");
        fs::write(&path, b"{not json").unwrap();
        assert!(matches!(
            read_document(&path),
            Err(PersistenceError::SerializationFailure { .. })
        ));
    }
}
