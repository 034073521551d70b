//! Storage housekeeping for downloaded files

pub mod cleanup;

pub use cleanup::{CleanupSweeper, SweeperConfig};
