//! REFLEDGER — referral-trading ledger.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod error;
pub mod clock;
pub mod ledger;
pub mod scheduler;
pub mod engine;
pub mod storage;
pub mod notify;
pub mod service;
pub mod dashboard;
