//! CLI commands

pub mod prepare;
pub mod start;
pub mod stop;
pub mod restart;
pub mod up;
pub mod down;
pub mod clean;
pub mod status;

// Individual app deployment
pub mod deploy;
pub mod remove;

// GitOps operations
pub mod sync;
pub mod suspend;
pub mod logs;

// Contract pipelines
pub mod secrets;
pub mod storage;

// Application builds
pub mod build;
