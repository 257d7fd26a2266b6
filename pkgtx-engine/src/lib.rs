#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]

#[cfg(feature = "cli")]
pub mod cli;
mod config;
mod engine;
mod error;
pub mod local_support;

pub use config::Config;
pub use engine::{Engine, InstallOutcome, UninstallOutcome};
pub use error::EngineError;
