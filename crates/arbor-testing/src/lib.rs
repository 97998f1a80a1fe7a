//! Testing utilities and harness for arbor.
//!
//! Provides a deterministic task scheduler and a headless rule that renders
//! into a [`arbor_core::MemoryHost`].

mod manual_scheduler;
mod testing;

pub use manual_scheduler::*;
pub use testing::*;

#[cfg(test)]
#[path = "tests/testing_tests.rs"]
mod testing_tests;
