//! Worboo reward relayer.
//!
//! Watches the registry for `GameRecorded` events and mints a fixed token
//! reward for every victory, exactly once per event occurrence.

pub mod api;
pub mod app;
pub mod config;
pub mod domain;
pub mod infra;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
