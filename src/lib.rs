//! Wallet recap: resolves an address or name, pulls its incoming transfers
//! from two networks and derives a per-account activity summary.
//!
//! The binary in `main.rs` wires real adapters into `recap::RecapPipeline`;
//! everything here is usable on its own with any `chain` trait impls.

pub mod chain;
pub mod config;
pub mod recap;
