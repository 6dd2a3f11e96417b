//! Watch set: the external file watcher, seen from the live server.

use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};

/// Something that can start watching a file identity.
///
/// Adding an identity that is already watched must be harmless.
pub trait WatchSet: Send + Sync {
    fn add(&self, identity: &str);
}

/// Watch set that only records identities; a watcher backend polls it or
/// the host reads it to configure its own watcher.
#[derive(Debug, Default)]
pub struct WatchList {
    files: Mutex<BTreeSet<String>>,
}

impl WatchList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(identity)
    }

    /// Watched identities, sorted.
    pub fn files(&self) -> Vec<String> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

impl WatchSet for WatchList {
    fn add(&self, identity: &str) {
        let inserted = self
            .files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identity.to_string());
        if inserted {
            tracing::debug!("Watching {}", identity);
        }
    }
}
