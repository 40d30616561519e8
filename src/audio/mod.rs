pub mod decoder;
pub mod engine;
pub mod player;
pub mod queue;
pub mod stream_source;

#[cfg(test)]
pub(crate) mod mock_engine;

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

// Poison-tolerant helpers shared by the download, decode and output threads.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn wait<'a, T>(cvar: &Condvar, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
    cvar.wait(guard).unwrap_or_else(PoisonError::into_inner)
}
