//! UserLedger — the authoritative per-user record store.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use super::{lock, read, write};
use crate::types::{UserAccount, UserId};

/// Shared handle to one account; lock it to read or mutate.
pub type AccountHandle = Arc<Mutex<UserAccount>>;

/// Accounts keyed by id. Ordered so that sweeps visit, and lock, users in
/// ascending id order.
#[derive(Default)]
pub struct UserLedger {
    accounts: RwLock<BTreeMap<UserId, AccountHandle>>,
}

impl UserLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the table from snapshotted accounts.
    pub fn restore(accounts: Vec<UserAccount>) -> Self {
        let map = accounts
            .into_iter()
            .map(|a| (a.id.clone(), Arc::new(Mutex::new(a))))
            .collect();
        Self { accounts: RwLock::new(map) }
    }

    /// Fetch the account, creating it with `make` on first sight.
    /// The flag is true when this call created the account.
    pub fn get_or_insert_with(
        &self,
        id: &str,
        make: impl FnOnce() -> UserAccount,
    ) -> (AccountHandle, bool) {
        if let Some(handle) = read(&self.accounts).get(id) {
            return (Arc::clone(handle), false);
        }

        match write(&self.accounts).entry(id.to_string()) {
            Entry::Occupied(e) => (Arc::clone(e.get()), false),
            Entry::Vacant(e) => (Arc::clone(e.insert(Arc::new(Mutex::new(make())))), true),
        }
    }

    pub fn handle(&self, id: &str) -> Option<AccountHandle> {
        read(&self.accounts).get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        read(&self.accounts).contains_key(id)
    }

    /// Run `f` against the account while holding its lock.
    pub fn update<R>(&self, id: &str, f: impl FnOnce(&mut UserAccount) -> R) -> Option<R> {
        let handle = self.handle(id)?;
        let mut account = lock(&handle);
        Some(f(&mut account))
    }

    /// Consistent copy of one account.
    pub fn snapshot(&self, id: &str) -> Option<UserAccount> {
        self.update(id, |a| a.clone())
    }

    /// All handles in ascending id order.
    pub fn handles(&self) -> Vec<(UserId, AccountHandle)> {
        read(&self.accounts)
            .iter()
            .map(|(id, h)| (id.clone(), Arc::clone(h)))
            .collect()
    }

    /// Copy of every account, each one individually consistent.
    pub fn snapshot_all(&self) -> Vec<UserAccount> {
        self.handles()
            .into_iter()
            .map(|(_, h)| lock(&h).clone())
            .collect()
    }

    /// Run `f` with every account locked in ascending id order. The table
    /// stays read-locked throughout, so no account can be added meanwhile.
    pub fn with_all_locked<R>(&self, f: impl FnOnce(&[MutexGuard<'_, UserAccount>]) -> R) -> R {
        let table = read(&self.accounts);
        let guards: Vec<MutexGuard<'_, UserAccount>> = table.values().map(|h| lock(h)).collect();
        f(&guards)
    }

    pub fn len(&self) -> usize {
        read(&self.accounts).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lock two distinct accounts in ascending id order and hand the guards
/// back in argument order.
pub fn lock_pair<'a>(
    (a_id, a): (&str, &'a AccountHandle),
    (b_id, b): (&str, &'a AccountHandle),
) -> (MutexGuard<'a, UserAccount>, MutexGuard<'a, UserAccount>) {
    if a_id <= b_id {
        let ga = lock(a);
        let gb = lock(b);
        (ga, gb)
    } else {
        let gb = lock(b);
        let ga = lock(a);
        (ga, gb)
    }
}
