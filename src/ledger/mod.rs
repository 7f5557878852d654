//! Record stores: the per-user account table and the append-only
//! transaction log.
//!
//! Each account sits behind its own mutex; the table itself is only
//! locked long enough to look up or insert a handle, except while a
//! full snapshot is taken. Lock order across the crate is: reset date →
//! batch book → accounts (ascending id) → transaction log.

pub mod transactions;
pub mod users;

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub use transactions::TransactionLedger;
pub use users::{AccountHandle, UserLedger};

/// Lock a mutex, recovering the data if a panicking holder poisoned it.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn read<T>(l: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    l.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(l: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    l.write().unwrap_or_else(PoisonError::into_inner)
}
