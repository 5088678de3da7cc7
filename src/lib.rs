//! Umbrella crate for the threaded tally workspace.
//!
//! The integration tests in `tests/` are written against this crate.

pub use rsp2_thread_tally as thread_tally;
pub use rsp2_thread_tally_config as config;
