//! Saveable capability and the handles the coordinator keeps to saveables.

use super::document::ComponentPayload;
use crate::component::ComponentHandle;
use parking_lot::Mutex;
use std::sync::Arc;

/// Capability for components that contribute state to save documents.
///
/// `save_id` must be stable across runs: it is the key the payload is
/// stored under and the only way it finds its way back on load.
pub trait Saveable: Send {
    fn save_id(&self) -> &str;

    fn save_data(&self) -> anyhow::Result<ComponentPayload>;

    fn load_save_data(&mut self, payload: &ComponentPayload) -> anyhow::Result<()>;
}

/// Shared standalone saveable not managed by the orchestrator
pub type SaveableHandle = Arc<Mutex<dyn Saveable>>;

/// A saveable known to the coordinator
#[derive(Clone)]
pub enum SaveableRef {
    /// Registered component exposing `as_saveable`
    Component { kind: String, handle: ComponentHandle },
    Standalone(SaveableHandle),
}

impl SaveableRef {
    /// Run `f` against the saveable. `None` if a component no longer
    /// exposes the capability.
    pub fn with_saveable<R>(&self, f: impl FnOnce(&mut dyn Saveable) -> R) -> Option<R> {
        match self {
            Self::Component { handle, .. } => {
                let mut component = handle.lock();
                component.as_saveable().map(f)
            }
            Self::Standalone(handle) => {
                let mut saveable = handle.lock();
                Some(f(&mut *saveable))
            }
        }
    }

    pub fn save_id(&self) -> Option<String> {
        self.with_saveable(|saveable| saveable.save_id().to_string())
    }

    pub fn component_kind(&self) -> Option<&str> {
        match self {
            Self::Component { kind, .. } => Some(kind),
            Self::Standalone(_) => None,
        }
    }

    /// Components are identified by kind, standalone saveables by pointer
    pub fn refers_to(&self, other: &SaveableRef) -> bool {
        match (self, other) {
            (Self::Component { kind: a, .. }, Self::Component { kind: b, .. }) => a == b,
            (Self::Standalone(a), Self::Standalone(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Point a component entry at `handle`. `false` if it already did.
    pub fn repoint(&mut self, replacement: &ComponentHandle) -> bool {
        match self {
            Self::Component { handle, .. } if !Arc::ptr_eq(handle, replacement) => {
                *handle = replacement.clone();
                true
            }
            _ => false,
        }
    }
}

impl std::fmt::Debug for SaveableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Component { kind, .. } => f.debug_tuple("Component").field(kind).finish(),
            Self::Standalone(_) => f.write_str("Standalone"),
        }
    }
}
