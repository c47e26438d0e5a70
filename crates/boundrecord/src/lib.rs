//! Storage backends and runtime configuration for bound records.
//!
//! The binding itself lives in `boundrecord_core`; this crate supplies the
//! concrete [`ItemStore`](boundrecord_core::store::ItemStore) implementations
//! selected through feature flags, plus the command-line front end.

pub mod cli;
pub mod config;
pub mod storage;
