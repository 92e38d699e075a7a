//! Core engine — the align → build → decide → stake loop.

pub mod accountant;
pub mod candles;
pub mod clock;
pub mod eligibility;
pub mod executor;
pub mod scheduler;
