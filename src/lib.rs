//! Run external commands and capture their output, either through separate
//! pipes or merged through a pseudo-terminal, plus the filesystem helpers
//! needed to stage and clean up that work.

/// Command-line interface for the `runcap` binary.
pub mod cli;
/// Crate-wide constants.
pub mod constants;
/// Filesystem and version helpers.
pub mod core;
/// Results and spawn configuration.
pub mod models;
pub mod system;

pub use crate::core::fs_utils::{
    ScopedTempDir, clean_path_on_failure, make_executable, rmtree, tmpdir,
};
pub use crate::core::version::parse_version;
pub use crate::models::{ProcessOptions, ProcessOutput, PtyOptions, StderrSpec, StdioSpec, TextOutput};
pub use crate::system::executor::{Runner, cmd_output, cmd_output_b, cmd_output_p};
pub use crate::system::process_error::{CalledProcessError, ProcessError};
pub use crate::system::resolver::{Resolution, Resolver, ShebangResolver};
