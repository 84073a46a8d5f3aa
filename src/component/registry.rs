//! # Component Registry
//!
//! Kind-keyed storage for managed components, owned by the orchestrator and
//! shared (cheap clone) with the subsystems that need to iterate it.
//!
//! Registration follows dictionary-assignment semantics: registering a second
//! component of the same kind replaces the first in place and keeps the
//! original registration position.

use super::{ComponentKind, ManagedComponent};
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Dynamically typed handle to a registered component
pub type ComponentHandle = Arc<Mutex<dyn ManagedComponent>>;

/// Result of a registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Inserted,
    /// An existing entry of the same kind was overwritten
    Replaced,
}

struct RegistryEntry {
    handle: ComponentHandle,
    typed: Arc<dyn Any + Send + Sync>,
}

#[derive(Default)]
struct RegistryInner {
    entries: HashMap<String, RegistryEntry>,
    order: Vec<String>,
}

/// Shared registry of managed components
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an owned component, returning its typed handle
    pub fn register<T>(&self, component: T) -> Arc<Mutex<T>>
    where
        T: ManagedComponent + ComponentKind,
    {
        let shared = Arc::new(Mutex::new(component));
        self.register_shared(shared.clone());
        shared
    }

    /// Register a component the caller already shares
    pub fn register_shared<T>(&self, component: Arc<Mutex<T>>) -> RegistrationOutcome
    where
        T: ManagedComponent + ComponentKind,
    {
        let handle: ComponentHandle = component.clone();
        let typed: Arc<dyn Any + Send + Sync> = component;
        let entry = RegistryEntry { handle, typed };

        let mut inner = self.inner.write();
        match inner.entries.insert(T::KIND.to_string(), entry) {
            Some(_) => {
                info!(
                    component = T::KIND,
                    "Duplicate registration - replacing existing component"
                );
                RegistrationOutcome::Replaced
            }
            None => {
                inner.order.push(T::KIND.to_string());
                debug!(component = T::KIND, "Registered component");
                RegistrationOutcome::Inserted
            }
        }
    }

    /// Exact-kind typed lookup; never constructs a component
    pub fn get<T>(&self) -> Option<Arc<Mutex<T>>>
    where
        T: ManagedComponent + ComponentKind,
    {
        let inner = self.inner.read();
        let entry = inner.entries.get(T::KIND)?;
        entry.typed.clone().downcast::<Mutex<T>>().ok()
    }

    pub fn get_handle(&self, kind: &str) -> Option<ComponentHandle> {
        self.inner
            .read()
            .entries
            .get(kind)
            .map(|entry| entry.handle.clone())
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.inner.read().entries.contains_key(kind)
    }

    pub fn remove(&self, kind: &str) -> Option<ComponentHandle> {
        let mut inner = self.inner.write();
        let entry = inner.entries.remove(kind)?;
        inner.order.retain(|k| k != kind);
        Some(entry.handle)
    }

    /// Registered kinds in registration order
    pub fn kinds(&self) -> Vec<String> {
        self.inner.read().order.clone()
    }

    /// Snapshot of (kind, handle) pairs in registration order.
    ///
    /// The registry lock is released before the snapshot is returned, so
    /// callers may lock components (and re-enter the registry) freely.
    pub fn handles(&self) -> Vec<(String, ComponentHandle)> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|kind| {
                inner
                    .entries
                    .get(kind)
                    .map(|entry| (kind.clone(), entry.handle.clone()))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.entries.clear();
        inner.order.clear();
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
