//! facstat status daemon library.
//!
//! This crate primarily ships a `status-daemon` binary, but exposes its parts
//! as a library for integration testing and for the admin CLI, which shares
//! the store and sync code.
//!
//! ## Architecture
//!
//! - **Store**: person records and the sync checkpoint (SQLite or in-memory)
//! - **Source**: the administrator-edited schedule file
//! - **Sync**: merges the source into the store when it changes
//! - **Scheduler**: recomputes every person's status on a fixed interval,
//!   clearing expired overrides through the sweeper

pub mod config;
pub mod scheduler;
pub mod shutdown;
pub mod source;
pub mod store;
pub mod sweeper;
pub mod sync;
