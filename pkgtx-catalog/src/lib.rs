#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]

mod client;
mod error;
mod xml;

pub use client::{filled_ref_from_catalog_package, read_local_package_file, CatalogClient, CatalogDependency, FilledRef};
pub use error::CatalogError;
pub use xml::{parse_categories, parse_single_package, write_categories, write_single_package, CatalogCategory, CatalogPackage};
