//! # trickle-core
//! Foundation types, traits and storage for the trickle reward system.

pub mod constants;
pub mod error;
pub mod schedule;
pub mod store;
pub mod traits;
pub mod types;
pub mod wide;
