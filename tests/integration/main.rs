//! End-to-end ledger scenarios driven through the public API.
//!
//! Every test pins time with a `ManualClock` in Africa/Lagos and samples
//! the lower bound of each rate band, so amounts are exact.

mod common;
mod concurrency;
mod lifecycle;
mod service;
