//! Reentrancy flag suppressing reactions to the controller's own writes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Engaged only while pipeline-derived or controller-originated writes are
/// being applied to the metadata record.
#[derive(Debug, Clone, Default)]
pub struct LoopGuard {
    engaged: Arc<AtomicBool>,
}

impl LoopGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engage the guard until the returned scope is dropped.
    ///
    /// Scopes nest: dropping an inner scope restores the state the outer one
    /// left, so early returns and `?` exits always release correctly.
    #[must_use = "the guard is released as soon as the scope is dropped"]
    pub fn engage(&self) -> LoopGuardScope {
        let previous = self.engaged.swap(true, Ordering::SeqCst);
        LoopGuardScope {
            engaged: self.engaged.clone(),
            previous,
        }
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged.load(Ordering::SeqCst)
    }
}

pub struct LoopGuardScope {
    engaged: Arc<AtomicBool>,
    previous: bool,
}

impl Drop for LoopGuardScope {
    fn drop(&mut self) {
        self.engaged.store(self.previous, Ordering::SeqCst);
    }
}
