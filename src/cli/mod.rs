//! Command-line front end support: workflow orchestration and log setup.

pub mod logging;
pub mod orchestration;
