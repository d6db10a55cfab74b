//! Editor State Mirror: a background-readable snapshot of selected Editor
//! state, refreshed only from the main thread.

use std::sync::{atomic::{AtomicBool, Ordering}, RwLock};

/// A point-in-time snapshot of the fields the Mirror exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorSnapshot {
    /// Whether the Editor is currently recompiling scripts.
    pub is_compiling: bool,
    /// Whether the Editor is mid-asset-database-update.
    pub is_updating: bool,
    /// The Editor's version string.
    pub editor_version: String,
}

impl Default for EditorSnapshot {
    /// Pre-refresh defaults, observed by any reader before the first
    /// main-thread refresh at bridge load.
    fn default() -> Self {
        Self { is_compiling: false, is_updating: false, editor_version: "unknown".to_string() }
    }
}

/// Background-readable snapshot of selected Editor state.
///
/// Writes only ever happen from the main thread via [`EditorStateMirror::refresh`].
/// Reads from any thread observe the most recently published snapshot. The
/// lock is held only long enough to clone the snapshot or swap it in, never
/// across an await or an Editor API call.
pub struct EditorStateMirror {
    snapshot: RwLock<EditorSnapshot>,
    refreshed_once: AtomicBool,
}

impl Default for EditorStateMirror {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorStateMirror {
    /// Create a mirror holding the pre-refresh default snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self { snapshot: RwLock::new(EditorSnapshot::default()), refreshed_once: AtomicBool::new(false) }
    }

    /// Publish a new snapshot. Call only from the main thread.
    #[allow(clippy::expect_used)]
    pub fn refresh(&self, snapshot: EditorSnapshot) {
        *self.snapshot.write().expect("invariant: mirror lock is never held across a panic") = snapshot;
        self.refreshed_once.store(true, Ordering::Release);
    }

    /// Read the most recently published snapshot. Safe from any thread.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn snapshot(&self) -> EditorSnapshot {
        self.snapshot.read().expect("invariant: mirror lock is never held across a panic").clone()
    }

    /// Whether [`Self::refresh`] has been called at least once.
    #[must_use]
    pub fn has_refreshed(&self) -> bool {
        self.refreshed_once.load(Ordering::Acquire)
    }
}
