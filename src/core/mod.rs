// src/core/mod.rs

/// Temporary directories, cleanup guards and forced removal.
pub mod fs_utils;
/// Dotted version parsing.
pub mod version;
