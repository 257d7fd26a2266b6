#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]

mod error;
mod plan;
mod traversal;

pub use error::UninstallError;
pub use plan::{UninstallFailure, UninstallPlan};
pub use traversal::resolve_uninstall;
