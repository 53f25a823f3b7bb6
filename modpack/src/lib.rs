//! Mod package format: a versioned, lz4 compressed stream of typed records
//! bundling level edits and loose files, plus the builder that produces
//! packages and the merge engine that applies them to the game archives.

mod builder;
mod error;
mod header;
mod kind;
mod package;
mod record;

pub mod content;
pub mod merge;
pub mod stream;
pub mod xml;

pub use builder::{BuildError, Level, PackageBuilder};
pub use error::Error;
pub use header::{Header, MAX_SUPPORTED_VERSION, PACKAGE_VERSION};
pub use kind::{Archive, ExtraFileKind, Tag};
pub use merge::{merge, ArchiveStore, MergeError, MergeOutput};
pub use package::{load_package_from_bytes, save_package_to_bytes, Package, PACKAGE_EXTENSION};
pub use record::{check_extra_path, Record};
