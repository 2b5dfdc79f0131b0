//! `UpdateManager`: routes identifier-keyed UI patches.
//!
//! Each numeric component identifier has at most one live callback. A
//! second [`register`](UpdateManager::register) for a live identifier is an
//! error; [`replace`](UpdateManager::replace) swaps the callback explicitly.
//! A patch for an identifier with no live callback means the client is out
//! of sync with the server: it is logged at error level and dropped, never
//! held for a later registrant.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, error};
use weft_core::errors::Result;
use weft_core::listeners::ListenerRegistry;
use weft_core::{ListenerId, SyncError};

/// Routes surgical updates to mounted components.
#[derive(Default)]
pub struct UpdateManager {
    slots: DashMap<u64, Arc<ListenerRegistry<Value>>>,
}

impl UpdateManager {
    /// Empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    fn owner(identifier: u64) -> ListenerId {
        ListenerId::from(format!("component/{identifier}"))
    }

    fn slot(&self, identifier: u64) -> Arc<ListenerRegistry<Value>> {
        let entry = self.slots.entry(identifier).or_insert_with(|| {
            Arc::new(ListenerRegistry::single(format!("component/{identifier}")))
        });
        Arc::clone(entry.value())
    }

    /// Register the callback for `identifier`.
    ///
    /// Fails with [`SyncError::ListenerConflict`] if one is already live.
    pub fn register(
        &self,
        identifier: u64,
        callback: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Result<()> {
        let slot = self.slot(identifier);
        if !slot.is_empty() {
            return Err(SyncError::ListenerConflict {
                target: slot.name().to_string(),
                existing: Self::owner(identifier).into_inner(),
            });
        }
        slot.listen(Self::owner(identifier), callback)
    }

    /// Install `callback` for `identifier`, displacing any live one.
    pub fn replace(&self, identifier: u64, callback: impl Fn(&Value) + Send + Sync + 'static) {
        let displaced = self.slot(identifier).replace(Self::owner(identifier), callback);
        debug!(identifier, displaced = !displaced.is_empty(), "update callback replaced");
    }

    /// Remove the callback and forget the latest patch. Returns whether a
    /// callback was live.
    pub fn unregister(&self, identifier: u64) -> bool {
        self.slots
            .remove(&identifier)
            .is_some_and(|(_, slot)| !slot.is_empty())
    }

    /// Deliver `patch` to the callback for `identifier`.
    ///
    /// With no callback the miss is logged at error level and the patch is
    /// discarded.
    pub fn apply(&self, identifier: u64, patch: Value) {
        let slot = self.slots.get(&identifier).map(|s| Arc::clone(s.value()));
        let delivered = slot.map_or(0, |slot| slot.emit(patch));
        if delivered == 0 {
            error!(identifier, "update for component with no registered callback");
        }
    }

    /// Latest patch delivered to the live callback for `identifier`.
    pub fn latest(&self, identifier: u64) -> Option<Value> {
        self.slots.get(&identifier).and_then(|slot| slot.current())
    }

    /// Whether `identifier` has a live callback.
    pub fn is_registered(&self, identifier: u64) -> bool {
        self.slots
            .get(&identifier)
            .is_some_and(|slot| !slot.is_empty())
    }
}
