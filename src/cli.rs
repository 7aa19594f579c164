// src/cli.rs

use crate::models::{ProcessOptions, PtyOptions};
use anyhow::{Result, anyhow};
use clap::Parser;
use std::path::PathBuf;

/// runcap: run a command and capture its output.
///
/// By default stdout and stderr are captured through separate pipes and the
/// command must exit with 0. With `--pty` both streams are captured together
/// through a pseudo-terminal and any exit code is accepted.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Capture through a pseudo-terminal, merging stderr into stdout.
    #[arg(long)]
    pub pty: bool,

    /// The exit code the command is expected to return.
    #[arg(long, default_value_t = 0, conflicts_with = "any_retcode")]
    pub retcode: i32,

    /// Accept any exit code.
    #[arg(long)]
    pub any_retcode: bool,

    /// Working directory for the command.
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Extra environment variables (e.g., "KEY=VALUE"). Repeatable.
    #[arg(long, value_delimiter = ',')]
    pub env: Vec<String>,

    /// Print the result as JSON instead of replaying the captured output.
    #[arg(long)]
    pub json: bool,

    /// The command to run, followed by its arguments.
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl Cli {
    /// Splits every `--env` entry at its first `=`.
    pub fn env_pairs(&self) -> Result<Vec<(String, String)>> {
        let mut pairs = Vec::with_capacity(self.env.len());
        for entry in &self.env {
            match entry.split_once('=') {
                Some((key, value)) if !key.is_empty() => {
                    pairs.push((key.to_string(), value.to_string()));
                }
                _ => {
                    return Err(anyhow!(
                        "Invalid --env entry '{}'. Expected 'KEY=VALUE'.",
                        entry
                    ));
                }
            }
        }
        Ok(pairs)
    }

    /// Options for the piped runner: retcode expectation, env and cwd from the flags.
    pub fn process_options(&self) -> Result<ProcessOptions> {
        let mut options = ProcessOptions::new()
            .retcode((!self.any_retcode).then_some(self.retcode))
            .envs(self.env_pairs()?);
        if let Some(cwd) = &self.cwd {
            options = options.cwd(cwd);
        }
        Ok(options)
    }

    /// Options for the pty runner: env and cwd from the flags.
    pub fn pty_options(&self) -> Result<PtyOptions> {
        let mut options = PtyOptions::new().envs(self.env_pairs()?);
        if let Some(cwd) = &self.cwd {
            options = options.cwd(cwd);
        }
        Ok(options)
    }
}

/// Maps a captured return code onto a status this process can exit with.
///
/// A child killed by signal `N` reports `-N`; the shell convention `128 + N`
/// is used for it. Everything else is clamped to `0..=255`.
pub fn exit_status(returncode: i32) -> i32 {
    if returncode < 0 {
        128_i32.saturating_add(returncode.saturating_neg()).min(255)
    } else {
        returncode.min(255)
    }
}
