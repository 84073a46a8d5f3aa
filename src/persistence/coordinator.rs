//! # Persistence Coordinator
//!
//! Snapshots every saveable into a slot file and restores them from one.
//!
//! ## Overview
//!
//! Saves and loads are cooperative multi-step tasks advanced one step per
//! tick from `update`, so a large save never stalls the host loop for more
//! than one step. The `_now` variants drive the same steps to completion
//! synchronously for hosts (and tests) that want an immediate result.
//!
//! - Save: `Write` (collect contributions, serialize, atomic write), then
//!   `Finalize` (refresh the slot index, notify)
//! - Load: `Read` (read and parse the whole document), then `Apply` (hand
//!   payloads to saveables). A document that fails to parse never reaches
//!   `Apply`, so live state is untouched.
//!
//! Save and load are mutually exclusive: at most one of the two is in flight
//! at any time.
//!
//! Notifications are raised on the bus' core channels while the coordinator
//! is busy; listeners must not call back into the coordinator synchronously.

use super::document::{SaveDocument, SaveMetadata};
use super::saveable::{SaveableHandle, SaveableRef};
use super::slots::{SaveSlotInfo, SlotIndex, SlotNaming};
use super::storage::{self, PersistenceResult};
use crate::component::{
    ComponentCapabilities, ComponentHandle, ComponentKind, ComponentPriority, ComponentRegistry,
    CoreContext, ManagedComponent, TickContext,
};
use crate::config::PersistenceConfig;
use crate::constants;
use crate::error::PersistenceError;
use crate::events::{
    EventBus, LoadNotification, PersistenceFailure, PersistenceOperation, SaveNotification,
};
use crate::logging::{log_error, log_lifecycle_operation, log_persistence_operation};
use crate::orchestration::StepSequence;
use crate::state_machine::RunState;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SaveStep {
    Write,
    Finalize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadStep {
    Read,
    Apply,
}

/// What the coordinator is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceActivity {
    Idle,
    Saving,
    Loading,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SaveRequest {
    slot: u32,
    description: String,
    is_auto_save: bool,
}

struct PendingSave {
    request: SaveRequest,
    path: PathBuf,
    steps: StepSequence<SaveStep>,
    started: Instant,
}

struct PendingLoad {
    slot: u32,
    path: PathBuf,
    steps: StepSequence<LoadStep>,
    document: Option<SaveDocument>,
    started: Instant,
}

/// Outcome of a completed load
#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub slot: u32,
    pub metadata: SaveMetadata,
    /// Save ids whose payload was applied
    pub applied: Vec<String>,
    /// Saveables with no payload in the document
    pub missing: Vec<String>,
    /// Saveables that rejected their payload
    pub failed: Vec<String>,
    /// Payloads in the document no saveable claimed
    pub unclaimed: Vec<String>,
}

/// Lifetime counters for the coordinator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistenceStats {
    pub saves_completed: u64,
    pub auto_saves_completed: u64,
    pub loads_completed: u64,
    pub save_failures: u64,
    pub load_failures: u64,
    pub contribution_failures: u64,
    pub cancelled: u64,
    pub last_save_duration_ms: Option<u64>,
    pub last_load_duration_ms: Option<u64>,
    pub last_saved_at: Option<DateTime<Utc>>,
}

pub struct PersistenceCoordinator {
    config: PersistenceConfig,
    naming: SlotNaming,
    initialized: bool,
    registry: Option<ComponentRegistry>,
    event_bus: Option<EventBus>,
    saveables: Vec<SaveableRef>,
    index: SlotIndex,
    save_in_progress: bool,
    load_in_progress: bool,
    pending_save: Option<PendingSave>,
    pending_load: Option<PendingLoad>,
    finished_save: Option<PersistenceResult<SaveSlotInfo>>,
    finished_load: Option<PersistenceResult<LoadReport>>,
    play_time_seconds: f64,
    auto_save_elapsed: f64,
    auto_save_active: bool,
    run_state: RunState,
    stats: PersistenceStats,
    last_error: Option<String>,
}

impl PersistenceCoordinator {
    pub fn new(config: PersistenceConfig) -> Self {
        let naming = SlotNaming::from_config(&config);
        Self {
            config,
            naming,
            initialized: false,
            registry: None,
            event_bus: None,
            saveables: Vec::new(),
            index: SlotIndex::new(),
            save_in_progress: false,
            load_in_progress: false,
            pending_save: None,
            pending_load: None,
            finished_save: None,
            finished_load: None,
            play_time_seconds: 0.0,
            auto_save_elapsed: 0.0,
            auto_save_active: false,
            run_state: RunState::Uninitialized,
            stats: PersistenceStats::default(),
            last_error: None,
        }
    }

    pub fn config(&self) -> &PersistenceConfig {
        &self.config
    }

    pub fn naming(&self) -> &SlotNaming {
        &self.naming
    }

    // ---------------------------------------------------------------------
    // Saveable registration
    // ---------------------------------------------------------------------

    /// Track a saveable that is not an orchestrator-managed component
    pub fn register_saveable(&mut self, saveable: SaveableHandle) -> bool {
        self.add_saveable(SaveableRef::Standalone(saveable))
    }

    /// Track a registered component exposing the saveable capability
    pub fn register_component_saveable(
        &mut self,
        kind: impl Into<String>,
        handle: ComponentHandle,
    ) -> bool {
        self.add_saveable(SaveableRef::Component {
            kind: kind.into(),
            handle,
        })
    }

    /// A component kind is tracked once; registering it again re-points the
    /// entry at the new handle
    fn add_saveable(&mut self, saveable: SaveableRef) -> bool {
        if let Some(known) = self
            .saveables
            .iter_mut()
            .find(|known| known.refers_to(&saveable))
        {
            return match &saveable {
                SaveableRef::Component { kind, handle } if known.repoint(handle) => {
                    info!(component = %kind, "Saveable re-pointed to replacement component");
                    true
                }
                _ => false,
            };
        }
        debug!(saveable = ?saveable, "Registered saveable");
        self.saveables.push(saveable);
        true
    }

    /// Stop tracking every saveable reporting `save_id`.
    ///
    /// Locks each tracked saveable to read its id; must not be called from
    /// inside one of them.
    pub fn unregister_saveable(&mut self, save_id: &str) -> bool {
        let before = self.saveables.len();
        self.saveables
            .retain(|saveable| saveable.save_id().as_deref() != Some(save_id));
        self.saveables.len() != before
    }

    /// Stop tracking the component registered under `kind`
    pub fn unregister_component_saveable(&mut self, kind: &str) -> bool {
        let before = self.saveables.len();
        self.saveables
            .retain(|saveable| saveable.component_kind() != Some(kind));
        self.saveables.len() != before
    }

    /// Re-scan the registry for saveable components registered since startup
    pub fn discover_saveables(&mut self) -> usize {
        let Some(registry) = self.registry.clone() else {
            return 0;
        };
        let mut added = 0;
        for (kind, handle) in registry.handles() {
            if kind == Self::KIND {
                continue;
            }
            let is_saveable = handle.lock().as_saveable().is_some();
            if is_saveable && self.register_component_saveable(kind, handle) {
                added += 1;
            }
        }
        added
    }

    /// Follow the registry before touching component state: replaced
    /// components are re-pointed, removed ones dropped and late ones added
    fn sync_component_saveables(&mut self) {
        let Some(registry) = self.registry.clone() else {
            return;
        };
        self.saveables.retain_mut(|saveable| {
            let Some(kind) = saveable.component_kind().map(str::to_owned) else {
                return true;
            };
            match registry.get_handle(&kind) {
                Some(current) => {
                    saveable.repoint(&current);
                    true
                }
                None => {
                    debug!(component = %kind, "Dropping saveable no longer registered");
                    false
                }
            }
        });
        self.discover_saveables();
    }

    pub fn saveable_count(&self) -> usize {
        self.saveables.len()
    }

    // ---------------------------------------------------------------------
    // Save
    // ---------------------------------------------------------------------

    /// Begin a cooperative save into a manual slot
    pub fn save_game(&mut self, slot: u32, description: impl Into<String>) -> PersistenceResult<()> {
        if self.naming.is_auto_save_slot(slot) {
            return Err(PersistenceError::ReservedSlot { slot });
        }
        self.begin_save(SaveRequest {
            slot,
            description: description.into(),
            is_auto_save: false,
        })
    }

    /// Begin a cooperative auto-save, returning the rotated slot
    pub fn auto_save(&mut self) -> PersistenceResult<u32> {
        let slot = self
            .index
            .next_auto_save_slot(&self.naming)
            .ok_or(PersistenceError::ReservedSlot {
                slot: constants::persistence::AUTO_SAVE_SLOT_BASE,
            })?;
        self.begin_save(SaveRequest {
            slot,
            description: "Auto Save".to_string(),
            is_auto_save: true,
        })?;
        Ok(slot)
    }

    pub fn save_game_now(
        &mut self,
        slot: u32,
        description: impl Into<String>,
    ) -> PersistenceResult<SaveSlotInfo> {
        self.save_game(slot, description)?;
        self.finish_save()
    }

    pub fn auto_save_now(&mut self) -> PersistenceResult<SaveSlotInfo> {
        self.auto_save()?;
        self.finish_save()
    }

    fn begin_save(&mut self, request: SaveRequest) -> PersistenceResult<()> {
        if !self.initialized {
            return Err(PersistenceError::NotInitialized);
        }
        if self.save_in_progress {
            warn!(slot = request.slot, "Save rejected - a save is already in progress");
            return Err(PersistenceError::SaveInProgress);
        }
        if self.load_in_progress {
            warn!(slot = request.slot, "Save rejected - a load is in progress");
            return Err(PersistenceError::LoadInProgress);
        }

        let path = self
            .naming
            .path_for(&self.config.save_directory, request.slot, request.is_auto_save);

        self.save_in_progress = true;
        log_persistence_operation(
            if request.is_auto_save { "auto_save" } else { "save" },
            Some(request.slot),
            "started",
            None,
            Some(&request.description),
        );
        if let Some(bus) = &self.event_bus {
            bus.core_channels().save_started.raise(SaveNotification {
                slot: request.slot,
                description: request.description.clone(),
                is_auto_save: request.is_auto_save,
                path: None,
            });
        }

        self.pending_save = Some(PendingSave {
            request,
            path,
            steps: StepSequence::new([SaveStep::Write, SaveStep::Finalize]),
            started: Instant::now(),
        });
        Ok(())
    }

    fn finish_save(&mut self) -> PersistenceResult<SaveSlotInfo> {
        while self.pending_save.is_some() {
            self.advance_save();
        }
        self.finished_save
            .take()
            .unwrap_or(Err(PersistenceError::Cancelled))
    }

    fn advance_save(&mut self) -> bool {
        let Some(mut pending) = self.pending_save.take() else {
            return false;
        };
        let Some(step) = pending.steps.next_step() else {
            self.save_in_progress = false;
            return false;
        };

        match step {
            SaveStep::Write => match self.write_save(&pending) {
                Ok(bytes) => {
                    debug!(slot = pending.request.slot, bytes = bytes, "Save document written");
                    self.pending_save = Some(pending);
                }
                Err(error) => self.fail_save(&pending, error),
            },
            SaveStep::Finalize => match self.finalize_save(&pending) {
                Ok(info) => self.complete_save(&pending, info),
                Err(error) => self.fail_save(&pending, error),
            },
        }
        true
    }

    fn write_save(&mut self, pending: &PendingSave) -> PersistenceResult<usize> {
        self.sync_component_saveables();
        let (document, failures) = self.build_document(&pending.request);
        self.stats.contribution_failures += failures;
        let bytes = document
            .to_bytes(self.config.pretty_print)
            .map_err(|e| PersistenceError::serialization(&pending.path, e))?;
        storage::write_atomic(&pending.path, &bytes)?;
        Ok(bytes.len())
    }

    /// Collect contributions; a failing contributor is logged and skipped
    fn build_document(&self, request: &SaveRequest) -> (SaveDocument, u64) {
        let mut document = SaveDocument::new(SaveMetadata {
            slot_number: request.slot,
            description: request.description.clone(),
            save_time: Utc::now(),
            version: self.config.application_version.clone(),
            play_time_seconds: self.play_time_seconds,
            is_auto_save: request.is_auto_save,
        });

        let mut failures = 0;
        for saveable in &self.saveables {
            let contribution =
                saveable.with_saveable(|s| (s.save_id().to_string(), s.save_data()));
            match contribution {
                None => continue,
                Some((save_id, Ok(payload))) => {
                    if !document.insert(save_id.clone(), payload) {
                        warn!(save_id = %save_id, "Duplicate save id - keeping first contribution");
                        failures += 1;
                    }
                }
                Some((save_id, Err(error))) => {
                    let failure = PersistenceError::ComponentContributionFailure {
                        save_id,
                        reason: format!("{error:#}"),
                    };
                    log_error(
                        Self::KIND,
                        "save_data",
                        &failure.to_string(),
                        Some(&format!("slot {}", request.slot)),
                    );
                    failures += 1;
                }
            }
        }
        (document, failures)
    }

    fn finalize_save(&self, pending: &PendingSave) -> PersistenceResult<SaveSlotInfo> {
        storage::describe_slot(
            &pending.path,
            pending.request.slot,
            pending.request.is_auto_save,
        )
    }

    fn complete_save(&mut self, pending: &PendingSave, info: SaveSlotInfo) {
        let duration_ms = pending.started.elapsed().as_millis() as u64;
        self.index.upsert(info.clone());
        self.save_in_progress = false;
        self.stats.saves_completed += 1;
        if pending.request.is_auto_save {
            self.stats.auto_saves_completed += 1;
        }
        self.stats.last_save_duration_ms = Some(duration_ms);
        self.stats.last_saved_at = Some(Utc::now());

        log_persistence_operation(
            if pending.request.is_auto_save { "auto_save" } else { "save" },
            Some(pending.request.slot),
            "completed",
            Some(duration_ms),
            Some(&pending.path.display().to_string()),
        );
        if let Some(bus) = &self.event_bus {
            bus.core_channels().save_completed.raise(SaveNotification {
                slot: pending.request.slot,
                description: pending.request.description.clone(),
                is_auto_save: pending.request.is_auto_save,
                path: Some(pending.path.clone()),
            });
        }
        self.finished_save = Some(Ok(info));
    }

    fn fail_save(&mut self, pending: &PendingSave, error: PersistenceError) {
        self.save_in_progress = false;
        self.stats.save_failures += 1;
        let message = error.to_string();
        log_error(
            Self::KIND,
            "save",
            &message,
            Some(&format!("slot {}", pending.request.slot)),
        );
        if let Some(bus) = &self.event_bus {
            bus.core_channels().save_error.raise(PersistenceFailure {
                operation: PersistenceOperation::Save,
                slot: Some(pending.request.slot),
                kind: error.kind().to_string(),
                message: message.clone(),
            });
        }
        self.last_error = Some(message);
        self.finished_save = Some(Err(error));
    }

    // ---------------------------------------------------------------------
    // Load
    // ---------------------------------------------------------------------

    /// Begin a cooperative load from an existing slot
    pub fn load_game(&mut self, slot: u32) -> PersistenceResult<()> {
        if !self.initialized {
            return Err(PersistenceError::NotInitialized);
        }
        if self.load_in_progress {
            warn!(slot = slot, "Load rejected - a load is already in progress");
            return Err(PersistenceError::LoadInProgress);
        }
        if self.save_in_progress {
            warn!(slot = slot, "Load rejected - a save is in progress");
            return Err(PersistenceError::SaveInProgress);
        }

        let Some(info) = self.index.get(slot) else {
            let error = PersistenceError::SlotNotFound(slot);
            self.report_load_failure(slot, &error);
            return Err(error);
        };
        let path = info.file_path.clone();

        self.load_in_progress = true;
        log_persistence_operation("load", Some(slot), "started", None, None);
        if let Some(bus) = &self.event_bus {
            bus.core_channels().load_started.raise(LoadNotification {
                slot,
                path: path.clone(),
            });
        }

        self.pending_load = Some(PendingLoad {
            slot,
            path,
            steps: StepSequence::new([LoadStep::Read, LoadStep::Apply]),
            document: None,
            started: Instant::now(),
        });
        Ok(())
    }

    pub fn load_game_now(&mut self, slot: u32) -> PersistenceResult<LoadReport> {
        self.load_game(slot)?;
        while self.pending_load.is_some() {
            self.advance_load();
        }
        self.finished_load
            .take()
            .unwrap_or(Err(PersistenceError::Cancelled))
    }

    fn advance_load(&mut self) -> bool {
        let Some(mut pending) = self.pending_load.take() else {
            return false;
        };
        let Some(step) = pending.steps.next_step() else {
            self.load_in_progress = false;
            return false;
        };

        match step {
            LoadStep::Read => match storage::read_document(&pending.path) {
                Ok(document) => {
                    pending.document = Some(document);
                    self.pending_load = Some(pending);
                }
                Err(error) => self.fail_load(pending.slot, error),
            },
            LoadStep::Apply => match pending.document.take() {
                Some(document) => {
                    let report = self.apply_document(pending.slot, document);
                    self.complete_load(&pending, report);
                }
                None => self.fail_load(pending.slot, PersistenceError::Cancelled),
            },
        }
        true
    }

    fn apply_document(&mut self, slot: u32, document: SaveDocument) -> LoadReport {
        self.sync_component_saveables();
        let mut applied = Vec::new();
        let mut missing = Vec::new();
        let mut failed = Vec::new();
        let mut claimed = HashSet::new();

        for saveable in &self.saveables {
            let outcome = saveable.with_saveable(|s| {
                let save_id = s.save_id().to_string();
                let result = document
                    .payload(&save_id)
                    .map(|payload| s.load_save_data(payload));
                (save_id, result)
            });
            match outcome {
                None => continue,
                Some((save_id, None)) => missing.push(save_id),
                Some((save_id, Some(Ok(())))) => {
                    claimed.insert(save_id.clone());
                    applied.push(save_id);
                }
                Some((save_id, Some(Err(error)))) => {
                    log_error(
                        Self::KIND,
                        "load_save_data",
                        &format!("{error:#}"),
                        Some(&format!("save_id {save_id}, slot {slot}")),
                    );
                    claimed.insert(save_id.clone());
                    failed.push(save_id);
                }
            }
        }

        let unclaimed: Vec<String> = document
            .component_data
            .keys()
            .filter(|save_id| !claimed.contains(*save_id))
            .cloned()
            .collect();
        if !unclaimed.is_empty() {
            debug!(slot = slot, unclaimed = ?unclaimed, "Ignoring payloads with no saveable");
        }

        self.play_time_seconds = document.metadata.play_time_seconds;
        LoadReport {
            slot,
            metadata: document.metadata,
            applied,
            missing,
            failed,
            unclaimed,
        }
    }

    fn complete_load(&mut self, pending: &PendingLoad, report: LoadReport) {
        let duration_ms = pending.started.elapsed().as_millis() as u64;
        self.load_in_progress = false;
        self.stats.loads_completed += 1;
        self.stats.last_load_duration_ms = Some(duration_ms);

        log_persistence_operation(
            "load",
            Some(pending.slot),
            "completed",
            Some(duration_ms),
            Some(&format!(
                "{} applied, {} missing, {} failed",
                report.applied.len(),
                report.missing.len(),
                report.failed.len()
            )),
        );
        if let Some(bus) = &self.event_bus {
            bus.core_channels().load_completed.raise(LoadNotification {
                slot: pending.slot,
                path: pending.path.clone(),
            });
        }
        self.finished_load = Some(Ok(report));
    }

    fn fail_load(&mut self, slot: u32, error: PersistenceError) {
        self.load_in_progress = false;
        self.report_load_failure(slot, &error);
        self.finished_load = Some(Err(error));
    }

    fn report_load_failure(&mut self, slot: u32, error: &PersistenceError) {
        self.stats.load_failures += 1;
        let message = error.to_string();
        log_error(Self::KIND, "load", &message, Some(&format!("slot {slot}")));
        if let Some(bus) = &self.event_bus {
            bus.core_channels().load_error.raise(PersistenceFailure {
                operation: PersistenceOperation::Load,
                slot: Some(slot),
                kind: error.kind().to_string(),
                message: message.clone(),
            });
        }
        self.last_error = Some(message);
    }

    // ---------------------------------------------------------------------
    // Task control
    // ---------------------------------------------------------------------

    /// Run one step of the in-flight operation. Returns false when idle.
    pub fn advance(&mut self) -> bool {
        if self.pending_save.is_some() {
            return self.advance_save();
        }
        self.advance_load()
    }

    /// Result of the most recently finished save, if not yet taken
    pub fn take_save_result(&mut self) -> Option<PersistenceResult<SaveSlotInfo>> {
        self.finished_save.take()
    }

    /// Result of the most recently finished load, if not yet taken
    pub fn take_load_result(&mut self) -> Option<PersistenceResult<LoadReport>> {
        self.finished_load.take()
    }

    /// Abandon in-flight operations. A slot file already committed by a
    /// finished write step stays on disk.
    pub fn cancel_pending(&mut self) {
        if let Some(mut pending) = self.pending_save.take() {
            pending.steps.cancel();
            warn!(slot = pending.request.slot, step = pending.steps.step_index(), "Save cancelled");
            self.stats.cancelled += 1;
            self.finished_save = Some(Err(PersistenceError::Cancelled));
        }
        if let Some(mut pending) = self.pending_load.take() {
            pending.steps.cancel();
            warn!(slot = pending.slot, step = pending.steps.step_index(), "Load cancelled");
            self.stats.cancelled += 1;
            self.finished_load = Some(Err(PersistenceError::Cancelled));
        }
        self.save_in_progress = false;
        self.load_in_progress = false;
    }

    pub fn activity(&self) -> PersistenceActivity {
        if self.save_in_progress {
            PersistenceActivity::Saving
        } else if self.load_in_progress {
            PersistenceActivity::Loading
        } else {
            PersistenceActivity::Idle
        }
    }

    pub fn is_save_in_progress(&self) -> bool {
        self.save_in_progress
    }

    pub fn is_load_in_progress(&self) -> bool {
        self.load_in_progress
    }

    fn poll_auto_save(&mut self, delta_seconds: f64) {
        if !self.auto_save_active || !self.config.auto_save_enabled {
            return;
        }
        self.auto_save_elapsed += delta_seconds;
        if self.auto_save_elapsed < self.config.auto_save_interval_seconds {
            return;
        }
        // retried on the next tick once the in-flight operation finishes
        if self.activity() != PersistenceActivity::Idle {
            return;
        }
        self.auto_save_elapsed = 0.0;
        match self.auto_save() {
            Ok(slot) => debug!(slot = slot, "Auto-save triggered"),
            Err(error) => warn!(error = %error, "Auto-save could not start"),
        }
    }

    // ---------------------------------------------------------------------
    // Slot catalog
    // ---------------------------------------------------------------------

    /// All known slots, ascending
    pub fn get_save_slots(&self) -> Vec<SaveSlotInfo> {
        self.index.all()
    }

    pub fn has_save(&self, slot: u32) -> bool {
        self.index.contains(slot)
    }

    pub fn slot_info(&self, slot: u32) -> Option<&SaveSlotInfo> {
        self.index.get(slot)
    }

    /// Most recently written slot
    pub fn latest_save(&self) -> Option<SaveSlotInfo> {
        self.index.latest().cloned()
    }

    /// Rebuild the index from the save directory
    pub fn refresh_save_slots(&mut self) -> PersistenceResult<usize> {
        let slots = storage::discover_slots(&self.config.save_directory, &self.naming)?;
        self.index.clear();
        for info in slots {
            self.index.upsert(info);
        }
        Ok(self.index.len())
    }

    /// Remove a slot file and its index entry. Rejected while any save or
    /// load is in flight.
    pub fn delete_save_slot(&mut self, slot: u32) -> PersistenceResult<()> {
        if self.save_in_progress {
            warn!(slot = slot, "Delete rejected - a save is in progress");
            return Err(PersistenceError::SaveInProgress);
        }
        if self.load_in_progress {
            warn!(slot = slot, "Delete rejected - a load is in progress");
            return Err(PersistenceError::LoadInProgress);
        }

        let info = self
            .index
            .get(slot)
            .cloned()
            .ok_or(PersistenceError::SlotNotFound(slot))?;

        match fs::remove_file(&info.file_path) {
            Ok(()) => {}
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => return Err(PersistenceError::io("delete", &info.file_path, error)),
        }
        let temp = SlotNaming::temp_path(&info.file_path);
        if temp.exists() {
            fs::remove_file(&temp).map_err(|e| PersistenceError::io("delete", &temp, e))?;
        }

        self.index.remove(slot);
        log_persistence_operation("delete", Some(slot), "completed", None, None);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Diagnostics
    // ---------------------------------------------------------------------

    pub fn play_time_seconds(&self) -> f64 {
        self.play_time_seconds
    }

    pub fn stats(&self) -> &PersistenceStats {
        &self.stats
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_auto_save_active(&self) -> bool {
        self.auto_save_active
    }
}

impl ComponentKind for PersistenceCoordinator {
    const KIND: &'static str = constants::components::PERSISTENCE;
}

impl ManagedComponent for PersistenceCoordinator {
    fn name(&self) -> &str {
        "PersistenceCoordinator"
    }

    fn priority(&self) -> ComponentPriority {
        ComponentPriority::High
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn persist_across_reset(&self) -> bool {
        true
    }

    fn capabilities(&self) -> ComponentCapabilities {
        ComponentCapabilities::default()
            .with_ticks_while_paused()
            .with_state_observer()
    }

    fn initialize(&mut self, ctx: &CoreContext) -> anyhow::Result<()> {
        if self.initialized {
            return Ok(());
        }

        fs::create_dir_all(&self.config.save_directory).with_context(|| {
            format!(
                "creating save directory {}",
                self.config.save_directory.display()
            )
        })?;

        self.registry = Some(ctx.registry().clone());
        self.event_bus = Some(ctx.event_bus().clone());
        self.run_state = ctx.state();
        let discovered = self.discover_saveables();
        let slots = self.refresh_save_slots()?;

        self.initialized = true;
        self.auto_save_active = self.config.auto_save_enabled;
        self.auto_save_elapsed = 0.0;

        log_lifecycle_operation(
            "initialize",
            Some(Self::KIND),
            "initialized",
            Some(&format!(
                "{discovered} saveable components, {} total saveables, {slots} slots",
                self.saveables.len()
            )),
        );
        Ok(())
    }

    fn shutdown(&mut self) -> anyhow::Result<()> {
        if !self.initialized {
            return Ok(());
        }
        self.cancel_pending();
        self.auto_save_active = false;
        self.saveables.clear();
        self.registry = None;
        self.event_bus = None;
        self.initialized = false;
        log_lifecycle_operation("shutdown", Some(Self::KIND), "shutdown", None);
        Ok(())
    }

    /// Accumulate play time, poll the auto-save timer and advance one step
    fn update(&mut self, tick: &TickContext) {
        if !self.initialized {
            return;
        }
        let delta = tick.delta_seconds();
        if !tick.is_paused() && tick.state.is_active() {
            self.play_time_seconds += delta;
        }
        if !tick.is_paused() && tick.state == RunState::Running {
            self.poll_auto_save(delta);
        }
        self.advance();
    }

    fn on_state_changed(&mut self, _previous: RunState, current: RunState) {
        self.run_state = current;
        if current == RunState::Shutdown {
            self.auto_save_active = false;
            self.cancel_pending();
            info!("Auto-save poller stopped for shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EventsConfig;
    use crate::persistence::{ComponentPayload, Saveable};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;
    use uuid::Uuid;

    struct Counter {
        id: &'static str,
        count: u32,
    }

    impl Saveable for Counter {
        fn save_id(&self) -> &str {
            self.id
        }

        fn save_data(&self) -> anyhow::Result<ComponentPayload> {
            Ok(ComponentPayload::new(1, json!({ "count": self.count })))
        }

        fn load_save_data(&mut self, payload: &ComponentPayload) -> anyhow::Result<()> {
            self.count = payload.data["count"]
                .as_u64()
                .context("count missing")? as u32;
            Ok(())
        }
    }

    fn coordinator(dir: &TempDir) -> PersistenceCoordinator {
        let config = PersistenceConfig {
            save_directory: dir.path().to_path_buf(),
            max_auto_saves: 2,
            ..PersistenceConfig::default()
        };
        let mut coordinator = PersistenceCoordinator::new(config);
        let ctx = CoreContext::new(
            Uuid::new_v4(),
            ComponentRegistry::new(),
            EventBus::new(EventsConfig::default()),
            RunState::Initializing,
        );
        coordinator.initialize(&ctx).unwrap();
        coordinator
    }

    #[test]
    fn test_save_advances_one_step_per_call() {
        let dir = TempDir::new().unwrap();
        let mut coordinator = coordinator(&dir);

        coordinator.save_game(1, "manual").unwrap();
        assert_eq!(coordinator.activity(), PersistenceActivity::Saving);
        assert!(coordinator.advance());
        assert!(coordinator.is_save_in_progress());
        assert!(coordinator.advance());
        assert!(!coordinator.is_save_in_progress());
        assert!(!coordinator.advance());

        let info = coordinator.take_save_result().unwrap().unwrap();
        assert_eq!(info.slot_number, 1);
        assert!(coordinator.has_save(1));
    }

    #[test]
    fn test_round_trip_restores_state() {
        let dir = TempDir::new().unwrap();
        let mut coordinator = coordinator(&dir);
        let plants = Arc::new(Mutex::new(Counter {
            id: "plantData",
            count: 5,
        }));
        coordinator.register_saveable(plants.clone());

        coordinator.save_game_now(1, "five plants").unwrap();
        plants.lock().count = 0;

        let report = coordinator.load_game_now(1).unwrap();
        assert_eq!(plants.lock().count, 5);
        assert_eq!(report.applied, vec!["plantData".to_string()]);
        assert_eq!(report.metadata.description, "five plants");
    }

    #[test]
    fn test_save_and_load_are_mutually_exclusive() {
        let dir = TempDir::new().unwrap();
        let mut coordinator = coordinator(&dir);
        coordinator.save_game_now(2, "base").unwrap();

        coordinator.save_game(3, "in flight").unwrap();
        assert!(matches!(
            coordinator.save_game(4, "second"),
            Err(PersistenceError::SaveInProgress)
        ));
        assert!(matches!(
            coordinator.load_game(2),
            Err(PersistenceError::SaveInProgress)
        ));
        while coordinator.advance() {}

        coordinator.load_game(2).unwrap();
        assert!(matches!(
            coordinator.save_game(5, "during load"),
            Err(PersistenceError::LoadInProgress)
        ));
        assert!(matches!(
            coordinator.load_game(2),
            Err(PersistenceError::LoadInProgress)
        ));
    }

    #[test]
    fn test_delete_rejected_while_any_operation_in_flight() {
        let dir = TempDir::new().unwrap();
        let mut coordinator = coordinator(&dir);
        coordinator.save_game_now(1, "keep").unwrap();
        coordinator.save_game_now(2, "other").unwrap();

        coordinator.save_game(8, "in flight").unwrap();
        assert!(matches!(
            coordinator.delete_save_slot(1),
            Err(PersistenceError::SaveInProgress)
        ));
        while coordinator.advance() {}

        coordinator.load_game(2).unwrap();
        assert!(matches!(
            coordinator.delete_save_slot(1),
            Err(PersistenceError::LoadInProgress)
        ));
        while coordinator.advance() {}

        coordinator.delete_save_slot(1).unwrap();
        assert!(!coordinator.has_save(1));
        assert!(coordinator.has_save(2));
    }

    #[test]
    fn test_manual_save_into_auto_band_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut coordinator = coordinator(&dir);
        assert!(matches!(
            coordinator.save_game(9000, "nope"),
            Err(PersistenceError::ReservedSlot { slot: 9000 })
        ));
    }

    #[test]
    fn test_cancel_pending_resets_flags() {
        let dir = TempDir::new().unwrap();
        let mut coordinator = coordinator(&dir);
        coordinator.save_game(1, "cancel me").unwrap();
        coordinator.cancel_pending();
        assert_eq!(coordinator.activity(), PersistenceActivity::Idle);
        assert!(matches!(
            coordinator.take_save_result(),
            Some(Err(PersistenceError::Cancelled))
        ));
        assert_eq!(coordinator.stats().cancelled, 1);
    }

    #[test]
    fn test_not_initialized_rejects_operations() {
        let mut coordinator = PersistenceCoordinator::new(PersistenceConfig::default());
        assert!(matches!(
            coordinator.save_game(1, "x"),
            Err(PersistenceError::NotInitialized)
        ));
        assert!(matches!(
            coordinator.load_game(1),
            Err(PersistenceError::NotInitialized)
        ));
    }
}
