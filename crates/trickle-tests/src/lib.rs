//! Scenario and adversarial test suite for the trickle reward system.
//!
//! This crate contains integration tests that drive a full controller over
//! an in-memory store and in-memory collaborators. The accounting invariants
//! are checked under scripted and randomized operation sequences.

pub mod helpers;
