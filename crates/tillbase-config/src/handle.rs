use crate::settings::Settings;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared, explicitly versioned settings snapshot. Readers take a cheap
/// `Arc` clone; writers swap the whole snapshot and bump the version.
#[derive(Default)]
pub struct SettingsHandle {
    inner: RwLock<Arc<Settings>>,
    version: AtomicU64,
}

impl SettingsHandle {
    pub fn new(settings: Settings) -> Self {
        SettingsHandle {
            inner: RwLock::new(Arc::new(settings)),
            version: AtomicU64::new(0),
        }
    }

    pub fn get(&self) -> Arc<Settings> {
        self.inner.read().clone()
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Swap in a new snapshot; returns the new version.
    pub fn replace(&self, settings: Settings) -> u64 {
        *self.inner.write() = Arc::new(settings);
        self.version.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Apply a mutation to a copy of the current snapshot and swap it in.
    pub fn update(&self, mutate: impl FnOnce(&mut Settings)) -> u64 {
        let mut next = (*self.get()).clone();
        mutate(&mut next);
        self.replace(next)
    }
}
