//! AUGUR — candle-driven binary-option signal engine.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod broker;
pub mod config;
pub mod engine;
pub mod features;
pub mod model;
pub mod strategy;
pub mod types;
