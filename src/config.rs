use crate::error::{ReleaseError, Result};
use crate::planner::PlannerSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Represents the complete configuration for git-release.
///
/// Names the remote to publish to, the branches a release may be forked from
/// without confirmation, where release metadata lives, and message templates.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_remote")]
    pub remote: String,

    #[serde(default = "default_trunk_branches")]
    pub trunk_branches: Vec<String>,

    #[serde(default)]
    pub files: FilesConfig,

    #[serde(default)]
    pub messages: MessagesConfig,
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_trunk_branches() -> Vec<String> {
    vec!["main".to_string(), "master".to_string()]
}

/// Locations of the release metadata, relative to the repository root.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FilesConfig {
    #[serde(default = "default_version_file")]
    pub version: PathBuf,

    #[serde(default = "default_companion_file")]
    pub companion: PathBuf,

    #[serde(default = "default_branch_field")]
    pub branch_field: String,
}

fn default_version_file() -> PathBuf {
    PathBuf::from("VERSION")
}

fn default_companion_file() -> PathBuf {
    PathBuf::from("template.toml")
}

fn default_branch_field() -> String {
    "branch".to_string()
}

impl Default for FilesConfig {
    fn default() -> Self {
        FilesConfig {
            version: default_version_file(),
            companion: default_companion_file(),
            branch_field: default_branch_field(),
        }
    }
}

/// Message templates; `{version}` is substituted.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MessagesConfig {
    #[serde(default = "default_release_message")]
    pub release_commit: String,

    #[serde(default = "default_release_message")]
    pub tag: String,

    #[serde(default = "default_pending_changes_message")]
    pub pending_changes: String,
}

fn default_release_message() -> String {
    "Release {version}".to_string()
}

fn default_pending_changes_message() -> String {
    "Prepare release {version}".to_string()
}

impl Default for MessagesConfig {
    fn default() -> Self {
        MessagesConfig {
            release_commit: default_release_message(),
            tag: default_release_message(),
            pending_changes: default_pending_changes_message(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            remote: default_remote(),
            trunk_branches: default_trunk_branches(),
            files: FilesConfig::default(),
            messages: MessagesConfig::default(),
        }
    }
}

impl Config {
    /// Planner conventions derived from this configuration
    pub fn planner_settings(&self) -> PlannerSettings {
        PlannerSettings {
            trunk_branches: self.trunk_branches.clone(),
            version_file: self.files.version.clone(),
            companion_file: self.files.companion.clone(),
            branch_field: self.files.branch_field.clone(),
            release_commit_message: self.messages.release_commit.clone(),
            tag_message: self.messages.tag.clone(),
            pending_changes_message: self.messages.pending_changes.clone(),
        }
    }
}

/// Loads configuration from file or returns defaults.
///
/// Attempts to load configuration in the following order:
/// 1. Custom path provided as parameter
/// 2. `gitrelease.toml` in current directory
/// 3. `gitrelease.toml` in the user config directory
/// 4. Default configuration if no file found
///
/// # Arguments
/// * `config_path` - Optional path to custom configuration file
///
/// # Returns
/// * `Ok(Config)` - Loaded or default configuration
/// * `Err` - If file exists but cannot be read or parsed
pub fn load_config(config_path: Option<&str>) -> Result<Config> {
    let path = if let Some(path) = config_path {
        PathBuf::from(path)
    } else if Path::new("./gitrelease.toml").exists() {
        PathBuf::from("./gitrelease.toml")
    } else if let Some(config_dir) = dirs::config_dir() {
        let user_config = config_dir.join("gitrelease.toml");
        if user_config.exists() {
            user_config
        } else {
            return Ok(Config::default());
        }
    } else {
        return Ok(Config::default());
    };

    let config_str = fs::read_to_string(&path).map_err(|e| {
        ReleaseError::config(format!("Cannot read {}: {}", path.display(), e))
    })?;
    toml::from_str(&config_str)
        .map_err(|e| ReleaseError::config(format!("Invalid {}: {}", path.display(), e)))
}
