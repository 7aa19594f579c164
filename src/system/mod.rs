//! # System Interaction Layer
//!
//! Everything that touches OS processes lives here.
//!
//! ## Modules
//!
//! - **`executor`**: the runners. Resolves a command, spawns it with piped or
//!   pseudo-terminal stdio, drains the output and checks the exit code.
//! - **`resolver`**: turns a command vector into an invocable one (PATH lookup,
//!   `#!` interpreters) or a synthetic "not found" result.
//! - **`pty`**: the pseudo-terminal pair used for merged capture. Unix only;
//!   elsewhere the executor falls back to pipes.
//! - **`process_error`**: runner errors, including the exit-code mismatch report.

/// Piped and pty runners.
pub mod executor;
/// Runner errors.
pub mod process_error;
#[cfg(unix)]
pub mod pty;
pub mod resolver;
