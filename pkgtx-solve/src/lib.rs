#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]

mod attribution;
mod conflict;
mod error;
mod request;
mod resolver;

pub use conflict::ConflictAnalyzer;
pub use error::SolveError;
pub use request::RequestedPackage;
pub use resolver::resolve_install;
