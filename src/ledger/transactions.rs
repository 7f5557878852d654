//! TransactionLedger — append-only log of every balance-affecting event.

use std::sync::Mutex;

use super::lock;
use crate::types::{Transaction, TransactionKind};

#[derive(Default)]
pub struct TransactionLedger {
    entries: Mutex<Vec<Transaction>>,
}

impl TransactionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn restore(entries: Vec<Transaction>) -> Self {
        Self { entries: Mutex::new(entries) }
    }

    pub fn append(&self, tx: Transaction) {
        lock(&self.entries).push(tx);
    }

    pub fn extend(&self, txs: impl IntoIterator<Item = Transaction>) {
        lock(&self.entries).extend(txs);
    }

    pub fn for_user(&self, user_id: &str) -> Vec<Transaction> {
        lock(&self.entries)
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn of_kind(&self, kind: TransactionKind) -> Vec<Transaction> {
        lock(&self.entries)
            .iter()
            .filter(|t| t.kind == kind)
            .cloned()
            .collect()
    }

    pub fn count(&self, user_id: &str, kind: TransactionKind) -> usize {
        lock(&self.entries)
            .iter()
            .filter(|t| t.user_id == user_id && t.kind == kind)
            .count()
    }

    pub fn all(&self) -> Vec<Transaction> {
        lock(&self.entries).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
