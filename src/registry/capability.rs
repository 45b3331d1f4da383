//! Capability registry - binds action and filter names per resource-type
//! class.
//!
//! Populated exactly once during catalog finalization, read-only for the
//! rest of the process lifetime. Registration is idempotent: re-registering
//! the same implementation type under an existing (class, kind, name) is a
//! no-op, while a different implementation under the same name is a
//! conflict.

use crate::capability::{Action, ResourceFilter};
use crate::error::{Error, Result};
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityKind {
    Action,
    Filter,
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityKind::Action => write!(f, "action"),
            CapabilityKind::Filter => write!(f, "filter"),
        }
    }
}

struct Entry<T: ?Sized> {
    implementation: Arc<T>,
    type_id: TypeId,
}

#[derive(Default)]
pub struct CapabilityRegistry {
    actions: HashMap<(String, String), Entry<dyn Action>>,
    filters: HashMap<(String, String), Entry<dyn ResourceFilter>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_action<A>(&mut self, class: &str, action: A) -> Result<()>
    where
        A: Action + 'static,
    {
        let name = action.name();
        let key = (class.to_string(), name.to_string());
        if let Some(existing) = self.actions.get(&key) {
            if existing.type_id == TypeId::of::<A>() {
                return Ok(());
            }
            return Err(Error::CapabilityConflict {
                class: class.to_string(),
                kind: CapabilityKind::Action,
                name: name.to_string(),
            });
        }
        self.actions.insert(
            key,
            Entry {
                implementation: Arc::new(action),
                type_id: TypeId::of::<A>(),
            },
        );
        Ok(())
    }

    pub fn register_filter<F>(&mut self, class: &str, filter: F) -> Result<()>
    where
        F: ResourceFilter + 'static,
    {
        let name = filter.name();
        let key = (class.to_string(), name.to_string());
        if let Some(existing) = self.filters.get(&key) {
            if existing.type_id == TypeId::of::<F>() {
                return Ok(());
            }
            return Err(Error::CapabilityConflict {
                class: class.to_string(),
                kind: CapabilityKind::Filter,
                name: name.to_string(),
            });
        }
        self.filters.insert(
            key,
            Entry {
                implementation: Arc::new(filter),
                type_id: TypeId::of::<F>(),
            },
        );
        Ok(())
    }

    pub fn action(&self, class: &str, name: &str) -> Result<Arc<dyn Action>> {
        self.actions
            .get(&(class.to_string(), name.to_string()))
            .map(|e| Arc::clone(&e.implementation))
            .ok_or_else(|| Error::UnknownCapability {
                class: class.to_string(),
                kind: CapabilityKind::Action,
                name: name.to_string(),
            })
    }

    pub fn filter(&self, class: &str, name: &str) -> Result<Arc<dyn ResourceFilter>> {
        self.filters
            .get(&(class.to_string(), name.to_string()))
            .map(|e| Arc::clone(&e.implementation))
            .ok_or_else(|| Error::UnknownCapability {
                class: class.to_string(),
                kind: CapabilityKind::Filter,
                name: name.to_string(),
            })
    }

    pub fn action_names(&self, class: &str) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .actions
            .keys()
            .filter(|(c, _)| c == class)
            .map(|(_, n)| n.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    pub fn filter_names(&self, class: &str) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .filters
            .keys()
            .filter(|(c, _)| c == class)
            .map(|(_, n)| n.as_str())
            .collect();
        names.sort_unstable();
        names
    }
}
