//! Single-flight guards.
//!
//! A [`FlightGuard`] is a two-state machine (`idle | busy`) flipped with an
//! atomic compare-and-swap. Acquiring returns a [`FlightPermit`]; dropping
//! the permit puts the guard back to idle on every exit path, including
//! early returns and errors.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Read-lock `lock`, recovering the data if a writer panicked.
///
/// Every writer in this crate leaves the value consistent (whole-value
/// replacement or a single push), so a poisoned lock still holds valid state.
pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
pub struct FlightGuard {
    busy: AtomicBool,
}

impl FlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move `idle → busy`. Returns `None` when already busy.
    pub fn try_acquire(&self) -> Option<FlightPermit<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightPermit { guard: self })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Proof that the holder owns the guard. Releases it on drop.
#[derive(Debug)]
pub struct FlightPermit<'a> {
    guard: &'a FlightGuard,
}

impl Drop for FlightPermit<'_> {
    fn drop(&mut self) {
        self.guard.busy.store(false, Ordering::Release);
    }
}
