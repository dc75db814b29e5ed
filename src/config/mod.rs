// src/config/mod.rs
pub mod poller;

pub use poller::{Credentials, PollerConfig, DEFAULT_CONFIG_PATH, ENV_CONFIG_PATH};
