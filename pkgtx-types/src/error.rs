use std::fmt::Debug;

/// Errors produced while constructing or validating core data model values.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A package or feature name was empty or contained a path separator.
    #[error("invalid name '{0}': names must be non-empty and must not contain '/'")]
    InvalidName(String),

    /// A version string was empty.
    #[error("invalid version: version strings must be non-empty")]
    InvalidVersion,

    /// A node index referred to a slot that does not exist in the arena it was
    /// presented against.
    #[error("node index {0} is out of bounds for this tree")]
    NodeIndexOutOfBounds(usize),
}
