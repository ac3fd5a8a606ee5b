use crate::domain::SemanticVersion;
use std::fmt;
use std::path::PathBuf;

/// Non-fatal observations made while planning a release.
/// These are reported to the user but never block the run.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryWarning {
    /// No version marker in the repository; comparisons start from 0.0.0
    MissingVersionMarker { path: PathBuf },
    /// The requested version equals the recorded one; the marker is left alone
    VersionUnchanged { version: SemanticVersion },
    /// A lower version is being released because the run is forced
    ForcedDowngrade {
        current: SemanticVersion,
        target: SemanticVersion,
    },
    /// The companion config file does not exist, so its branch field is not updated
    CompanionConfigMissing { path: PathBuf },
    /// The companion config file has no such field
    CompanionFieldMissing { path: PathBuf, field: String },
    /// A leftover local tag will be deleted and recreated on the release commit
    LocalTagReplaced { tag: String },
}

impl fmt::Display for BoundaryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundaryWarning::MissingVersionMarker { path } => {
                write!(
                    f,
                    "No version marker at '{}', treating current version as 0.0.0",
                    path.display()
                )
            }
            BoundaryWarning::VersionUnchanged { version } => {
                write!(f, "Version {} is already recorded, marker left unchanged", version)
            }
            BoundaryWarning::ForcedDowngrade { current, target } => {
                write!(f, "Forcing downgrade from {} to {}", current, target)
            }
            BoundaryWarning::CompanionConfigMissing { path } => {
                write!(
                    f,
                    "Companion config '{}' not found, branch field not updated",
                    path.display()
                )
            }
            BoundaryWarning::CompanionFieldMissing { path, field } => {
                write!(
                    f,
                    "Companion config '{}' has no '{}' field, not updated",
                    path.display(),
                    field
                )
            }
            BoundaryWarning::LocalTagReplaced { tag } => {
                write!(f, "Local tag '{}' exists and will be recreated", tag)
            }
        }
    }
}
