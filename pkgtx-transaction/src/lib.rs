#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]

mod error;
mod executor;
mod fetch;
mod journal;

pub use error::TransactionError;
pub use executor::{execute_install, execute_uninstall, revert};
pub use fetch::{FetchError, Fetcher};
pub use journal::{read_journal, read_journal_xml, write_journal, write_journal_xml, Journal, JournalEntry, JournalOperation};
