//! Single-slot registry enforcing one active music instance.

use crate::instance::{InstanceId, MusicInstance};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

/// Holds the music instance currently allowed to play.
///
/// Installing a new instance stops and disposes the previous occupant while
/// the slot is locked, so two pieces of music never overlap.
#[derive(Default)]
pub struct MusicRegistry {
    active: Mutex<Option<Arc<MusicInstance>>>,
}

impl MusicRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make `instance` the active music, retiring the previous one.
    pub fn set_active(&self, instance: Arc<MusicInstance>) {
        let mut slot = self.active.lock();
        if let Some(previous) = slot.take() {
            if previous.id() != instance.id() {
                info!(previous = %previous.id(), next = %instance.id(), "Replacing active music");
                previous.retire();
            }
        }
        *slot = Some(instance);
    }

    /// Clear the slot if it still holds `id`. Returns whether it did.
    pub fn clear_active(&self, id: InstanceId) -> bool {
        let removed = {
            let mut slot = self.active.lock();
            match slot.as_ref() {
                Some(current) if current.id() == id => slot.take(),
                _ => None,
            }
        };
        removed.is_some()
    }

    pub fn active(&self) -> Option<Arc<MusicInstance>> {
        self.active.lock().clone()
    }

    pub fn active_id(&self) -> Option<InstanceId> {
        self.active.lock().as_ref().map(|instance| instance.id())
    }
}

impl std::fmt::Debug for MusicRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MusicRegistry")
            .field("active", &self.active_id())
            .finish()
    }
}
