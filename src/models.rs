// src/models.rs

use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// --- Execution Results ---

/// The raw outcome of running a command: exit code plus fully buffered output.
///
/// `stderr` is `None` whenever standard error was not captured separately:
/// pty mode, merged stderr, inherited/null stderr, and the synthetic
/// "executable not found" result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `-signal` when the child was killed by a signal.
    pub returncode: i32,
    /// Captured stdout, or everything written to the terminal in pty mode.
    pub stdout: Vec<u8>,
    /// Captured stderr, when it was piped separately.
    pub stderr: Option<Vec<u8>>,
}

impl ProcessOutput {
    /// Builds a result without touching the OS, e.g. for an unresolvable command.
    pub fn synthetic(returncode: i32, stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            returncode,
            stdout: stdout.into(),
            stderr: None,
        }
    }

    /// Decodes both streams, replacing invalid UTF-8 sequences.
    /// Intended for display; use [`TextOutput::try_from`] when correctness matters.
    pub fn to_text_lossy(&self) -> TextOutput {
        TextOutput {
            returncode: self.returncode,
            stdout: String::from_utf8_lossy(&self.stdout).into_owned(),
            stderr: self
                .stderr
                .as_deref()
                .map(|s| String::from_utf8_lossy(s).into_owned()),
        }
    }
}

/// A [`ProcessOutput`] whose streams were decoded as UTF-8.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextOutput {
    /// Same as [`ProcessOutput::returncode`].
    pub returncode: i32,
    /// Decoded stdout.
    pub stdout: String,
    /// Decoded stderr, when it was captured.
    pub stderr: Option<String>,
}

impl TryFrom<ProcessOutput> for TextOutput {
    type Error = std::string::FromUtf8Error;

    fn try_from(output: ProcessOutput) -> Result<Self, Self::Error> {
        let stdout = String::from_utf8(output.stdout)?;
        let stderr = output.stderr.map(String::from_utf8).transpose()?;
        Ok(Self {
            returncode: output.returncode,
            stdout,
            stderr,
        })
    }
}

// --- Spawn Configuration ---

/// Where one of the child's standard streams is connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StdioSpec {
    /// Captured through a pipe owned by the runner.
    #[default]
    Pipe,
    /// Shared with the current process.
    Inherit,
    /// Connected to the null device.
    Null,
}

/// Where the child's stderr goes. Unlike stdin and stdout, it can follow stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StderrSpec {
    /// Captured through its own pipe.
    #[default]
    Pipe,
    /// Shared with the current process.
    Inherit,
    /// Connected to the null device.
    Null,
    /// Merged into stdout's destination; stderr is then reported as absent.
    Stdout,
}

impl From<StdioSpec> for StderrSpec {
    fn from(spec: StdioSpec) -> Self {
        match spec {
            StdioSpec::Pipe => Self::Pipe,
            StdioSpec::Inherit => Self::Inherit,
            StdioSpec::Null => Self::Null,
        }
    }
}

/// Immutable spawn configuration for the piped runner.
///
/// Every field has a default, so `ProcessOptions::default()` captures all three
/// streams, inherits the environment and working directory, and expects exit code 0.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    pub(crate) stdin: StdioSpec,
    pub(crate) stdout: StdioSpec,
    pub(crate) stderr: StderrSpec,
    pub(crate) cwd: Option<PathBuf>,
    pub(crate) env: HashMap<String, String>,
    pub(crate) env_remove: Vec<String>,
    pub(crate) env_clear: bool,
    pub(crate) input: Option<Vec<u8>>,
    pub(crate) retcode: Option<i32>,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            stdin: StdioSpec::Pipe,
            stdout: StdioSpec::Pipe,
            stderr: StderrSpec::Pipe,
            cwd: None,
            env: HashMap::new(),
            env_remove: Vec::new(),
            env_clear: false,
            input: None,
            retcode: Some(0),
        }
    }
}

impl ProcessOptions {
    /// Same as `ProcessOptions::default()`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the expected exit code. `None` accepts any exit code.
    #[must_use]
    pub fn retcode(mut self, retcode: Option<i32>) -> Self {
        self.retcode = retcode;
        self
    }

    /// Shorthand for `retcode(None)`.
    #[must_use]
    pub fn any_retcode(self) -> Self {
        self.retcode(None)
    }

    /// Where the child's stdin comes from.
    #[must_use]
    pub fn stdin(mut self, spec: StdioSpec) -> Self {
        self.stdin = spec;
        self
    }

    /// Where the child's stdout goes.
    #[must_use]
    pub fn stdout(mut self, spec: StdioSpec) -> Self {
        self.stdout = spec;
        self
    }

    /// Where the child's stderr goes; accepts a [`StdioSpec`] too.
    #[must_use]
    pub fn stderr(mut self, spec: impl Into<StderrSpec>) -> Self {
        self.stderr = spec.into();
        self
    }

    /// Bytes written to the child's stdin before it is closed.
    /// Ignored unless stdin is [`StdioSpec::Pipe`].
    #[must_use]
    pub fn input(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// Working directory for the child.
    #[must_use]
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Sets one environment variable for the child.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Sets several environment variables for the child.
    #[must_use]
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Removes an inherited variable from the child's environment.
    #[must_use]
    pub fn env_remove(mut self, key: impl Into<String>) -> Self {
        self.env_remove.push(key.into());
        self
    }

    /// Starts the child with an empty environment (plus anything set via `env`).
    #[must_use]
    pub fn env_clear(mut self) -> Self {
        self.env_clear = true;
        self
    }

    /// The exit code this configuration expects, if any.
    pub fn expected_retcode(&self) -> Option<i32> {
        self.retcode
    }
}

/// Spawn configuration for the pty runner.
///
/// Pty capture always merges stderr into stdout and accepts any exit code.
#[derive(Debug, Clone, Default)]
pub struct PtyOptions {
    pub(crate) cwd: Option<PathBuf>,
    pub(crate) env: HashMap<String, String>,
}

impl PtyOptions {
    /// Same as `PtyOptions::default()`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Working directory for the child.
    #[must_use]
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Sets one environment variable for the child.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Sets several environment variables for the child.
    #[must_use]
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// The piped-mode equivalent: stderr merged into stdout, any exit code.
    pub fn to_process_options(&self) -> ProcessOptions {
        ProcessOptions {
            stdin: StdioSpec::Null,
            stderr: StderrSpec::Stdout,
            cwd: self.cwd.clone(),
            env: self.env.clone(),
            retcode: None,
            ..ProcessOptions::default()
        }
    }
}
