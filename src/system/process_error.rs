// src/system/process_error.rs

use std::fmt;
use thiserror::Error;

/// Errors surfaced by the process runners.
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The argv was empty.
    #[error("No command specified to run.")]
    EmptyCommand,
    /// The OS refused to start the command.
    #[error("Command '{command}' could not be executed: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    /// Creating pipes or reading the child's output failed.
    #[error("I/O error while capturing process output: {0}")]
    Io(#[from] std::io::Error),
    /// The exit code did not match the expected one.
    #[error("{0}")]
    CalledProcess(#[from] CalledProcessError),
    /// Text mode could not decode the captured output.
    #[error("Command '{command}' produced output that was not valid UTF-8")]
    InvalidUtf8 {
        command: String,
        #[source]
        source: std::string::FromUtf8Error,
    },
}

/// A command exited with a code other than the one the caller expected.
///
/// Only the runners build this; callers inspect it through the accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalledProcessError {
    cmd: Vec<String>,
    returncode: i32,
    expected_returncode: i32,
    stdout: Vec<u8>,
    stderr: Option<Vec<u8>>,
}

impl CalledProcessError {
    pub(crate) fn new(
        cmd: Vec<String>,
        returncode: i32,
        expected_returncode: i32,
        stdout: Vec<u8>,
        stderr: Option<Vec<u8>>,
    ) -> Self {
        Self {
            cmd,
            returncode,
            expected_returncode,
            stdout,
            stderr,
        }
    }

    /// The argv that was run, after resolution when it succeeded.
    pub fn cmd(&self) -> &[String] {
        &self.cmd
    }

    /// The exit code the command actually returned.
    pub fn returncode(&self) -> i32 {
        self.returncode
    }

    /// The exit code the caller asked for.
    pub fn expected_returncode(&self) -> i32 {
        self.expected_returncode
    }

    /// Captured stdout.
    pub fn stdout(&self) -> &[u8] {
        &self.stdout
    }

    /// Captured stderr, if it was piped separately.
    pub fn stderr(&self) -> Option<&[u8]> {
        self.stderr.as_deref()
    }

    /// Renders the full diagnostic as raw bytes, preserving the captured output exactly.
    ///
    /// ```text
    /// command: ["false"]
    /// return code: 1
    /// expected return code: 0
    /// stdout: (none)
    /// stderr:
    ///     first line
    ///     second line
    /// ```
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64 + self.stdout.len());
        out.extend_from_slice(format!("command: {:?}\n", self.cmd).as_bytes());
        out.extend_from_slice(format!("return code: {}\n", self.returncode).as_bytes());
        out.extend_from_slice(
            format!("expected return code: {}\n", self.expected_returncode).as_bytes(),
        );
        out.extend_from_slice(b"stdout:");
        indent_or_none(&mut out, Some(&self.stdout));
        out.push(b'\n');
        out.extend_from_slice(b"stderr:");
        indent_or_none(&mut out, self.stderr.as_deref());
        out
    }
}

fn indent_or_none(out: &mut Vec<u8>, part: Option<&[u8]>) {
    match part {
        Some(bytes) if !bytes.is_empty() => {
            out.extend_from_slice(b"\n    ");
            for &b in bytes {
                out.push(b);
                if b == b'\n' {
                    out.extend_from_slice(b"    ");
                }
            }
        }
        _ => out.extend_from_slice(b" (none)"),
    }
}

impl fmt::Display for CalledProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.to_bytes()))
    }
}

impl std::error::Error for CalledProcessError {}
