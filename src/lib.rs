pub mod boundary;
pub mod cli;
pub mod config;
pub mod confirm;
pub mod domain;
pub mod error;
pub mod executor;
pub mod git;
pub mod metadata;
pub mod planner;
pub mod state;
pub mod ui;

pub use error::{ReleaseError, Result};
