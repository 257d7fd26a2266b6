#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]

mod arena;
mod error;
mod fill;
mod name;
mod package;
mod status;
mod tree;
mod version;

pub use arena::{Arena, NodeIndex};
pub use error::Error;
pub use fill::FillFlags;
pub use name::{Feature, Name};
pub use package::{
    make_ref, ref_matches_id, ref_readable_name, ref_related_as_child_family, BreakRecord, Dependency, ModifiesEntry,
    PackageRef,
};
pub use status::{BreakKind, ModStatus, Status};
pub use tree::{Category, ResolvedTree};
pub use version::{compare_version_strings, version_satisfies, Sense, Version};

pub use id::PackageId;

mod id;
