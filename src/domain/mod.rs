//! Domain logic - pure release naming and version rules independent of git operations

pub mod branch;
pub mod tag;
pub mod version;

pub use branch::{BranchContext, BranchKind};
pub use tag::Tag;
pub use version::{effective_version, SemanticVersion, VersionBump};
