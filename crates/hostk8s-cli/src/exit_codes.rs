//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

#![allow(dead_code)]

/// Success - operation completed without errors
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Cluster error - Kind cluster missing, not ready, or failed to change state
pub const CLUSTER_ERROR: i32 = 2;

/// Tool error - a required external tool is missing or failed
pub const TOOL_ERROR: i32 = 3;

/// Secret error - Vault or secret contract processing failed
pub const SECRET_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: i32 = 64;
