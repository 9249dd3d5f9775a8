//! Platform-specific filesystem operations.

pub mod fs;
pub mod link;
