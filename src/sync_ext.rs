use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock helper that survives poisoning. A panicking job task must not be
/// able to wedge the registry for every reader that comes after it.
pub(crate) trait MutexExt<T> {
    fn lock_unpoisoned(&self) -> MutexGuard<'_, T>;
}

impl<T> MutexExt<T> for Mutex<T> {
    fn lock_unpoisoned(&self) -> MutexGuard<'_, T> {
        self.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
