// src/system/resolver.rs

//! Turns a logical command vector into one the OS can spawn directly.
//!
//! Resolution never fails with an error: an unresolvable command becomes a
//! [`Resolution::NotFound`] carrying the result the runner should report.

use crate::models::ProcessOutput;
use std::env;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

/// Exit code reported for a command that could not be resolved.
pub const NOT_FOUND_RETURNCODE: i32 = 1;

/// Outcome of normalizing a command vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A directly invocable argv; the first element is a real path.
    Resolved(Vec<String>),
    /// The command cannot be run; this is what the caller should see instead.
    NotFound(ProcessOutput),
}

/// Maps a command vector to an invocable one, or reports that it cannot.
pub trait Resolver {
    /// Resolves `argv[0]` and returns the argv to execute.
    fn normalize(&self, argv: &[String]) -> Resolution;
}

/// Resolves bare names on `PATH` and prefixes the interpreter named by a `#!` line.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShebangResolver;

impl Resolver for ShebangResolver {
    fn normalize(&self, argv: &[String]) -> Resolution {
        match normalize_cmd(argv) {
            Ok(cmd) => Resolution::Resolved(cmd),
            Err(message) => {
                log::debug!("{}", message);
                Resolution::NotFound(ProcessOutput::synthetic(NOT_FOUND_RETURNCODE, message))
            }
        }
    }
}

fn normalize_cmd(argv: &[String]) -> Result<Vec<String>, String> {
    let Some((first, rest)) = argv.split_first() else {
        return Err("Executable `` not found".to_string());
    };

    // Run through the interpreter when the target is a script, so the same
    // argv works on platforms that do not honor shebangs.
    let exe = normexe(first)?;
    let mut cmd = parse_filename(Path::new(&exe));
    cmd.push(exe);
    cmd.extend(rest.iter().cloned());

    let Some((head, tail)) = cmd.split_first() else {
        return Err(format!("Executable `{}` not found", first));
    };
    let mut normalized = vec![normexe(head)?];
    normalized.extend_from_slice(tail);
    Ok(normalized)
}

/// Validates a single executable reference, searching `PATH` for bare names.
fn normexe(orig: &str) -> Result<String, String> {
    let error = |msg: &str| format!("Executable `{}` {}", orig, msg);

    let has_separator = orig.contains(std::path::MAIN_SEPARATOR) || orig.contains('/');
    if !has_separator {
        return find_executable(orig)
            .map(|p| p.to_string_lossy().into_owned())
            .ok_or_else(|| error("not found"));
    }

    let path = Path::new(orig);
    if path.is_dir() {
        Err(error("is a directory"))
    } else if !path.is_file() {
        Err(error("not found"))
    } else if !is_executable(path) {
        Err(error("is not executable"))
    } else {
        Ok(orig.to_string())
    }
}

/// Searches `PATH` for an executable file named `exe`.
pub fn find_executable(exe: &str) -> Option<PathBuf> {
    let path_var = env::var_os("PATH")?;
    let candidates = candidate_names(exe);
    env::split_paths(&path_var).find_map(|dir| {
        candidates
            .iter()
            .map(|name| dir.join(name))
            .find(|joined| joined.is_file() && is_executable(joined))
    })
}

#[cfg(windows)]
fn candidate_names(exe: &str) -> Vec<String> {
    let pathext = env::var("PATHEXT").unwrap_or_else(|_| ".COM;.EXE;.BAT;.CMD".to_string());
    let lower = exe.to_lowercase();
    let mut names: Vec<String> = pathext
        .split(';')
        .filter(|ext| !ext.is_empty() && !lower.ends_with(&ext.to_lowercase()))
        .map(|ext| format!("{}{}", exe, ext))
        .collect();
    names.insert(0, exe.to_string());
    names
}

#[cfg(not(windows))]
fn candidate_names(exe: &str) -> Vec<String> {
    vec![exe.to_string()]
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    fs::metadata(path).is_ok()
}

/// Returns the interpreter argv from the file's `#!` line, or nothing.
fn parse_filename(path: &Path) -> Vec<String> {
    match File::open(path) {
        Ok(file) => parse_shebang(file),
        Err(e) => {
            log::trace!("Could not open '{}' to read shebang: {}", path.display(), e);
            Vec::new()
        }
    }
}

fn parse_shebang(reader: impl Read) -> Vec<String> {
    let mut reader = BufReader::new(reader);
    let mut magic = [0u8; 2];
    if reader.read_exact(&mut magic).is_err() || &magic != b"#!" {
        return Vec::new();
    }

    let mut first_line = Vec::new();
    if reader.read_until(b'\n', &mut first_line).is_err() {
        return Vec::new();
    }
    let Ok(line) = std::str::from_utf8(&first_line) else {
        return Vec::new();
    };
    if !line
        .chars()
        .all(|c| c.is_ascii_graphic() || c.is_ascii_whitespace())
    {
        return Vec::new();
    }

    let mut cmd = shlex::split(line).unwrap_or_default();
    if cmd.first().map(String::as_str) == Some("/usr/bin/env") {
        cmd.remove(0);
    }
    cmd
}
