#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]

mod criterion;
mod error;
mod file_lps;
mod flags;
mod outcome;
mod record;

pub use criterion::Criterion;
pub use error::LPSError;
pub use file_lps::{FileLps, LocalPackageSystem};
pub use flags::{InstallFlags, UninstallFlags};
pub use outcome::PerPackageOutcome;
pub use record::{parse_record, write_record, InstalledRecord};
