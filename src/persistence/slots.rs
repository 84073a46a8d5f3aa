//! # Save Slots
//!
//! Slot numbering, file naming and the in-memory index of known slots.
//!
//! Manual saves use `{prefix}{slot:04}{ext}`. Auto-saves live in a reserved
//! band starting at slot 9000 and are written as
//! `{prefix}AutoSave_{slot:04}{ext}`.

use super::document::SaveMetadata;
use crate::config::PersistenceConfig;
use crate::constants::persistence::{AUTO_SAVE_MARKER, AUTO_SAVE_SLOT_BASE, TEMP_SUFFIX};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Catalog entry for one slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveSlotInfo {
    pub slot_number: u32,
    pub file_path: PathBuf,
    pub last_modified: DateTime<Utc>,
    pub file_size: u64,
    pub is_auto_save: bool,
    pub description: Option<String>,
    pub save_time: Option<DateTime<Utc>>,
    pub version: Option<String>,
    pub play_time_seconds: Option<f64>,
}

impl SaveSlotInfo {
    pub fn new(
        slot_number: u32,
        file_path: PathBuf,
        last_modified: DateTime<Utc>,
        file_size: u64,
        is_auto_save: bool,
    ) -> Self {
        Self {
            slot_number,
            file_path,
            last_modified,
            file_size,
            is_auto_save,
            description: None,
            save_time: None,
            version: None,
            play_time_seconds: None,
        }
    }

    pub fn with_metadata(mut self, metadata: &SaveMetadata) -> Self {
        self.description = Some(metadata.description.clone());
        self.save_time = Some(metadata.save_time);
        self.version = Some(metadata.version.clone());
        self.play_time_seconds = Some(metadata.play_time_seconds);
        self
    }
}

/// File naming rules for save slots
#[derive(Debug, Clone)]
pub struct SlotNaming {
    prefix: String,
    extension: String,
    max_auto_saves: u32,
}

impl SlotNaming {
    pub fn new(prefix: impl Into<String>, extension: impl Into<String>, max_auto_saves: u32) -> Self {
        let extension = extension.into();
        let extension = if extension.is_empty() || extension.starts_with('.') {
            extension
        } else {
            format!(".{extension}")
        };
        Self {
            prefix: prefix.into(),
            extension,
            max_auto_saves,
        }
    }

    pub fn from_config(config: &PersistenceConfig) -> Self {
        Self::new(
            config.file_prefix.clone(),
            config.file_extension.clone(),
            config.max_auto_saves,
        )
    }

    /// Reserved auto-save band
    pub fn auto_save_band(&self) -> Range<u32> {
        AUTO_SAVE_SLOT_BASE..AUTO_SAVE_SLOT_BASE.saturating_add(self.max_auto_saves)
    }

    pub fn is_auto_save_slot(&self, slot: u32) -> bool {
        self.auto_save_band().contains(&slot)
    }

    pub fn file_name(&self, slot: u32, is_auto_save: bool) -> String {
        if is_auto_save {
            format!("{}{AUTO_SAVE_MARKER}{slot:04}{}", self.prefix, self.extension)
        } else {
            format!("{}{slot:04}{}", self.prefix, self.extension)
        }
    }

    pub fn path_for(&self, directory: &Path, slot: u32, is_auto_save: bool) -> PathBuf {
        directory.join(self.file_name(slot, is_auto_save))
    }

    /// Parse a slot file name back into `(slot, is_auto_save)`
    pub fn parse_file_name(&self, file_name: &str) -> Option<(u32, bool)> {
        let stem = file_name
            .strip_prefix(&self.prefix)?
            .strip_suffix(&self.extension)?;
        let (digits, is_auto_save) = match stem.strip_prefix(AUTO_SAVE_MARKER) {
            Some(digits) => (digits, true),
            None => (stem, false),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok().map(|slot| (slot, is_auto_save))
    }

    /// `{path}.tmp` sibling used while writing
    pub fn temp_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(TEMP_SUFFIX);
        PathBuf::from(name)
    }
}

/// Ordered index of known slots
#[derive(Debug, Clone, Default)]
pub struct SlotIndex {
    slots: BTreeMap<u32, SaveSlotInfo>,
}

impl SlotIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, info: SaveSlotInfo) {
        self.slots.insert(info.slot_number, info);
    }

    pub fn get(&self, slot: u32) -> Option<&SaveSlotInfo> {
        self.slots.get(&slot)
    }

    pub fn remove(&mut self, slot: u32) -> Option<SaveSlotInfo> {
        self.slots.remove(&slot)
    }

    pub fn contains(&self, slot: u32) -> bool {
        self.slots.contains_key(&slot)
    }

    /// All entries, ascending by slot
    pub fn all(&self) -> Vec<SaveSlotInfo> {
        self.slots.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Most recently modified slot
    pub fn latest(&self) -> Option<&SaveSlotInfo> {
        self.slots.values().max_by_key(|info| info.last_modified)
    }

    /// Next auto-save target: the first unused slot in the band, otherwise
    /// the band slot with the oldest modification time (lowest slot on ties)
    pub fn next_auto_save_slot(&self, naming: &SlotNaming) -> Option<u32> {
        let band = naming.auto_save_band();
        if band.is_empty() {
            return None;
        }
        if let Some(free) = band.clone().find(|slot| !self.slots.contains_key(slot)) {
            return Some(free);
        }
        self.slots
            .range(band)
            .min_by_key(|(_, info)| info.last_modified)
            .map(|(slot, _)| *slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn naming() -> SlotNaming {
        SlotNaming::new("SaveGame_", ".json", 2)
    }

    fn info(slot: u32, age_minutes: i64) -> SaveSlotInfo {
        SaveSlotInfo::new(
            slot,
            PathBuf::from(format!("saves/{slot}")),
            Utc::now() - Duration::minutes(age_minutes),
            10,
            slot >= AUTO_SAVE_SLOT_BASE,
        )
    }

    #[test]
    fn test_file_names() {
        let naming = naming();
        assert_eq!(naming.file_name(1, false), "SaveGame_0001.json");
        assert_eq!(naming.file_name(9000, true), "SaveGame_AutoSave_9000.json");
        assert_eq!(naming.parse_file_name("SaveGame_0042.json"), Some((42, false)));
        assert_eq!(
            naming.parse_file_name("SaveGame_AutoSave_9001.json"),
            Some((9001, true))
        );
        assert_eq!(naming.parse_file_name("SaveGame_0042.json.tmp"), None);
        assert_eq!(naming.parse_file_name("Other_0042.json"), None);
        assert_eq!(naming.parse_file_name("SaveGame_.json"), None);
    }

    #[test]
    fn test_extension_is_normalized() {
        let naming = SlotNaming::new("S_", "sav", 1);
        assert_eq!(naming.file_name(3, false), "S_0003.sav");
    }

    #[test]
    fn test_temp_path_appends_suffix() {
        let path = PathBuf::from("saves/SaveGame_0001.json");
        assert_eq!(
            SlotNaming::temp_path(&path),
            PathBuf::from("saves/SaveGame_0001.json.tmp")
        );
    }

    #[test]
    fn test_auto_save_rotation() {
        let naming = naming();
        let mut index = SlotIndex::new();
        assert_eq!(index.next_auto_save_slot(&naming), Some(9000));

        index.upsert(info(9000, 10));
        assert_eq!(index.next_auto_save_slot(&naming), Some(9001));

        index.upsert(info(9001, 5));
        assert_eq!(index.next_auto_save_slot(&naming), Some(9000));

        index.upsert(info(9000, 0));
        assert_eq!(index.next_auto_save_slot(&naming), Some(9001));
    }

    #[test]
    fn test_rotation_ties_pick_lowest_slot() {
        let naming = naming();
        let mut index = SlotIndex::new();
        let stamp = Utc::now();
        for slot in [9001, 9000] {
            let mut entry = info(slot, 0);
            entry.last_modified = stamp;
            index.upsert(entry);
        }
        assert_eq!(index.next_auto_save_slot(&naming), Some(9000));
    }

    #[test]
    fn test_manual_slots_ignored_by_rotation() {
        let naming = naming();
        let mut index = SlotIndex::new();
        index.upsert(info(1, 100));
        index.upsert(info(9000, 1));
        index.upsert(info(9001, 2));
        assert_eq!(index.next_auto_save_slot(&naming), Some(9001));
        assert!(naming.is_auto_save_slot(9001));
        assert!(!naming.is_auto_save_slot(9002));
    }
}
