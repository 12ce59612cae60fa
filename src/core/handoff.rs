//! # Surface hand-off store.
//!
//! A surface instance owns one [`Registry`]. When the surface is torn down
//! and recreated, its live entries are parked here under a logical name that
//! survives the recreation, then restored into the replacement registry.
//!
//! ```text
//! old surface teardown ──► HandOff::park("main", &old)    (export_all)
//! new surface created  ──► HandOff::restore("main", &new) (import_all + rebind)
//! ```
//!
//! Moved entries keep running. They see no attach/detach transition because
//! of the move itself; the new registry's own `set_attached` drives them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::core::lock;
use crate::error::RuntimeError;

use super::registry::{Registry, RegistrySnapshot};

/// Entries parked between two registry instances, keyed by logical name.
#[derive(Default)]
pub struct HandOff {
    parked: Mutex<HashMap<String, RegistrySnapshot>>,
}

impl HandOff {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves every live entry of `registry` under `name`.
    ///
    /// Parking twice under the same name merges the snapshots; on a tag clash
    /// the entry parked last wins. Returns the number of entries moved by this call.
    pub fn park(&self, name: &str, registry: &Registry) -> usize {
        let snapshot = registry.export_all();
        let moved = snapshot.len();

        let mut parked = lock(&self.parked);
        match parked.get_mut(name) {
            Some(existing) => existing.merge(snapshot),
            None => {
                parked.insert(name.to_owned(), snapshot);
            }
        }
        moved
    }

    /// Moves the entries parked under `name` into `registry`.
    ///
    /// Restoring an unknown name moves nothing and returns `Ok(0)`. On a tag
    /// clash nothing is moved and the entries stay parked.
    pub fn restore(&self, name: &str, registry: &Arc<Registry>) -> Result<usize, RuntimeError> {
        let Some(snapshot) = lock(&self.parked).remove(name) else {
            return Ok(0);
        };

        match registry.import_all(snapshot) {
            Ok(n) => Ok(n),
            Err((err, snapshot)) => {
                let mut parked = lock(&self.parked);
                match parked.get_mut(name) {
                    // Parked again meanwhile; the newer entries win.
                    Some(newer) => {
                        let mut restored = snapshot;
                        restored.merge(std::mem::take(newer));
                        *newer = restored;
                    }
                    None => {
                        parked.insert(name.to_owned(), snapshot);
                    }
                }
                Err(err)
            }
        }
    }

    /// Returns `true` if anything is parked under `name`.
    pub fn is_parked(&self, name: &str) -> bool {
        lock(&self.parked).get(name).is_some_and(|s| !s.is_empty())
    }

    /// Logical names with parked entries.
    pub fn names(&self) -> Vec<String> {
        lock(&self.parked)
            .iter()
            .filter(|(_, s)| !s.is_empty())
            .map(|(n, _)| n.clone())
            .collect()
    }
}
