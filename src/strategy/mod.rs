//! Strategy layer — the confidence gate and martingale staking.

pub mod gate;
pub mod martingale;

pub use gate::DecisionGate;
pub use martingale::{MartingaleConfig, MartingaleRun, MartingaleStrategy, RunState, WagerExecutor};
