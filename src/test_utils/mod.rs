//! Test utilities shared by unit and integration tests.

pub mod mocks;

pub use mocks::{
    MemoryEventStore, MockConfig, MockEventSource, MockRewardToken, poison_metrics,
};
