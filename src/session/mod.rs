//! Async coordination for one open explorer view.
//!
//! Every request a view issues is tagged with a per-lane sequence token. Completions are matched
//! against the lane's latest token and anything older is dropped, so no code here depends on the
//! order in which responses arrive.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod classify;
pub mod explorer;
pub mod lanes;
pub mod poller;
pub mod search;

// Lane state holds plain data; a panicked writer cannot leave it half-updated
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
