//! # Persistence
//!
//! Save slots on disk and the coordinator that snapshots saveable components
//! into them.
//!
//! - [`document`]: on-disk document shape and component payloads
//! - [`slots`]: slot naming, auto-save band and the slot index
//! - [`storage`]: atomic writes, reads and directory discovery
//! - [`saveable`]: the capability components implement to take part
//! - [`coordinator`]: cooperative save/load tasks and auto-save rotation

pub mod coordinator;
pub mod document;
pub mod saveable;
pub mod slots;
pub mod storage;

pub use coordinator::{LoadReport, PersistenceActivity, PersistenceCoordinator, PersistenceStats};
pub use document::{ComponentPayload, SaveDocument, SaveMetadata};
pub use saveable::{Saveable, SaveableHandle, SaveableRef};
pub use slots::{SaveSlotInfo, SlotIndex, SlotNaming};
pub use storage::PersistenceResult;
