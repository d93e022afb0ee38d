//! Small utilities shared by the delivery sync crates.
pub mod helpers;
mod secret;

pub use helpers::{env_flag, env_value_or_default, parse_boolean_flag};
pub use secret::Secret;
