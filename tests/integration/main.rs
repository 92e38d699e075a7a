//! Integration tests: the candle → feature → decision → stake pipeline
//! driven through in-memory and paper brokers.

mod mock_broker;
mod pipeline;
