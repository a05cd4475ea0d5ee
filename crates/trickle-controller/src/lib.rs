//! # trickle-controller — Reward controller orchestration.
//!
//! - [`controller::RewardController`] — registration, tracking, collection,
//!   rate override, sweep and termination over one store
//! - [`shared::SharedController`] — instance-wide lock with re-entrancy rejection
//! - [`config::ControllerConfig`] — deployment configuration and loading
//! - [`boundary`] — the collaborator bundle and in-memory adapters

pub mod boundary;
pub mod config;
pub mod controller;
pub mod shared;

pub use boundary::Boundaries;
pub use config::ControllerConfig;
pub use controller::RewardController;
pub use shared::SharedController;
