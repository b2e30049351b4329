pub mod board;
pub mod constants;
pub mod deadlock;
pub mod engine;
pub mod error;
pub mod groups;
pub mod logging;
pub mod rng;
pub mod server_protocol;
pub mod server_utils;
pub mod tiers;
pub mod types;
