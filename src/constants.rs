// src/constants.rs

/// Size of each read from the pty's read end.
pub const PTY_READ_CHUNK_SIZE: usize = 4096;

/// Prefix for directories created by `core::fs_utils::tmpdir`.
pub const TMPDIR_PREFIX: &str = "runcap-";
