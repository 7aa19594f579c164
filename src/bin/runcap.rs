// src/bin/runcap.rs

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use runcap::cli::{Cli, exit_status};
use runcap::{ProcessError, ProcessOutput, Runner};
use std::io::Write;

/// Runs the requested command, replays or reports its output, and exits with its return code.
fn main() {
    env_logger::init();

    match run_cli(Cli::parse()) {
        Ok(code) => std::process::exit(exit_status(code)),
        Err(e) => {
            // An exit-code mismatch already carries the full report; print it as-is.
            if let Some(ProcessError::CalledProcess(called)) = e.downcast_ref::<ProcessError>() {
                eprintln!("{}", "Command failed".red().bold());
                eprintln!("{}", called);
                std::process::exit(exit_status(called.returncode()).max(1));
            }
            eprintln!("\n{}: {:#}", "Error".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn run_cli(cli: Cli) -> Result<i32> {
    log::debug!("CLI args parsed: {:?}", cli);
    let runner = Runner::new();

    let output = if cli.pty {
        let options = cli.pty_options()?;
        runner.output_pty(&cli.command, &options)?
    } else {
        let options = cli.process_options()?;
        runner.output_bytes(&cli.command, &options)?
    };

    if cli.json {
        let report = serde_json::to_string_pretty(&output.to_text_lossy())
            .context("Failed to serialize the result as JSON")?;
        println!("{}", report);
    } else {
        replay(&output)?;
    }
    Ok(output.returncode)
}

/// Writes the captured streams back to this process's stdout and stderr.
fn replay(output: &ProcessOutput) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(&output.stdout)
        .and_then(|()| stdout.flush())
        .context("Failed to write captured stdout")?;
    if let Some(stderr) = &output.stderr {
        let mut handle = std::io::stderr().lock();
        handle
            .write_all(stderr)
            .context("Failed to write captured stderr")?;
    }
    Ok(())
}
