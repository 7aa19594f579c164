// src/system/executor.rs

use crate::models::{ProcessOutput, ProcessOptions, PtyOptions, StderrSpec, StdioSpec, TextOutput};
use crate::system::process_error::{CalledProcessError, ProcessError};
use crate::system::resolver::{Resolution, Resolver, ShebangResolver};
use std::collections::HashMap;
use std::io::{self, ErrorKind, Read, Write};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};

/// Runs commands through a [`Resolver`] and captures their output.
///
/// The runner itself is stateless; every call resolves, spawns, drains and
/// waits before returning.
#[derive(Debug, Clone, Default)]
pub struct Runner<R = ShebangResolver> {
    resolver: R,
}

impl Runner {
    /// A runner using [`ShebangResolver`].
    pub fn new() -> Self {
        Self {
            resolver: ShebangResolver,
        }
    }
}

impl<R: Resolver> Runner<R> {
    /// A runner that resolves commands through `resolver`.
    pub fn with_resolver(resolver: R) -> Self {
        Self { resolver }
    }

    /// The resolver this runner uses.
    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Runs `argv` with the given stream configuration and returns the raw output.
    ///
    /// An unresolvable executable is not an error: the resolver's synthetic
    /// result is returned (or checked against `retcode`) without spawning anything.
    ///
    /// # Errors
    /// - [`ProcessError::CalledProcess`] when `retcode` is set and differs from the exit code.
    /// - [`ProcessError::Spawn`] / [`ProcessError::Io`] for OS-level failures.
    pub fn output_bytes<S: AsRef<str>>(
        &self,
        argv: &[S],
        options: &ProcessOptions,
    ) -> Result<ProcessOutput, ProcessError> {
        let argv = to_invocation(argv)?;

        let (cmd, output) = match self.resolver.normalize(&argv) {
            Resolution::NotFound(output) => {
                log::debug!("Not spawning {:?}: executable could not be resolved.", argv);
                (argv, output)
            }
            Resolution::Resolved(cmd) => {
                let output = spawn_piped(&cmd, options)?;
                (cmd, output)
            }
        };

        check_retcode(cmd, output, options.retcode)
    }

    /// Same as [`Runner::output_bytes`], with both streams decoded as UTF-8.
    pub fn output<S: AsRef<str>>(
        &self,
        argv: &[S],
        options: &ProcessOptions,
    ) -> Result<TextOutput, ProcessError> {
        let output = self.output_bytes(argv, options)?;
        TextOutput::try_from(output).map_err(|source| ProcessError::InvalidUtf8 {
            command: display_command(argv),
            source,
        })
    }

    /// Runs `argv` attached to a pseudo-terminal, capturing stdout and stderr
    /// together exactly as the child wrote them.
    ///
    /// Any exit code is accepted and `stderr` is always `None`.
    #[cfg(unix)]
    pub fn output_pty<S: AsRef<str>>(
        &self,
        argv: &[S],
        options: &PtyOptions,
    ) -> Result<ProcessOutput, ProcessError> {
        let argv = to_invocation(argv)?;
        match self.resolver.normalize(&argv) {
            Resolution::NotFound(output) => {
                log::debug!("Not allocating a pty for {:?}: executable could not be resolved.", argv);
                Ok(output)
            }
            Resolution::Resolved(cmd) => spawn_pty(&cmd, options),
        }
    }

    /// Without pty support, fall back to pipes with stderr merged into stdout.
    #[cfg(not(unix))]
    pub fn output_pty<S: AsRef<str>>(
        &self,
        argv: &[S],
        options: &PtyOptions,
    ) -> Result<ProcessOutput, ProcessError> {
        self.output_bytes(argv, &options.to_process_options())
    }
}

/// Runs a command with the default resolver. See [`Runner::output_bytes`].
pub fn cmd_output_b<S: AsRef<str>>(
    argv: &[S],
    options: &ProcessOptions,
) -> Result<ProcessOutput, ProcessError> {
    Runner::new().output_bytes(argv, options)
}

/// Runs a command with the default resolver. See [`Runner::output`].
pub fn cmd_output<S: AsRef<str>>(
    argv: &[S],
    options: &ProcessOptions,
) -> Result<TextOutput, ProcessError> {
    Runner::new().output(argv, options)
}

/// Runs a command with the default resolver. See [`Runner::output_pty`].
pub fn cmd_output_p<S: AsRef<str>>(
    argv: &[S],
    options: &PtyOptions,
) -> Result<ProcessOutput, ProcessError> {
    Runner::new().output_pty(argv, options)
}

// --- Internals ---

fn to_invocation<S: AsRef<str>>(argv: &[S]) -> Result<Vec<String>, ProcessError> {
    if argv.is_empty() {
        return Err(ProcessError::EmptyCommand);
    }
    Ok(argv.iter().map(|s| s.as_ref().to_string()).collect())
}

fn display_command<S: AsRef<str>>(argv: &[S]) -> String {
    let words: Vec<&str> = argv.iter().map(|s| s.as_ref()).collect();
    shlex::try_join(words.iter().copied()).unwrap_or_else(|_| words.join(" "))
}

fn check_retcode(
    cmd: Vec<String>,
    output: ProcessOutput,
    expected: Option<i32>,
) -> Result<ProcessOutput, ProcessError> {
    match expected {
        Some(expected) if expected != output.returncode => {
            log::debug!(
                "Command {:?} exited with {} (expected {}).",
                cmd,
                output.returncode,
                expected
            );
            Err(CalledProcessError::new(
                cmd,
                output.returncode,
                expected,
                output.stdout,
                output.stderr,
            )
            .into())
        }
        _ => Ok(output),
    }
}

fn base_command(
    cmd: &[String],
    cwd: Option<&Path>,
    env: &HashMap<String, String>,
) -> Result<Command, ProcessError> {
    let (program, args) = cmd.split_first().ok_or(ProcessError::EmptyCommand)?;
    let mut command = Command::new(program);
    command.args(args);
    if let Some(cwd) = cwd {
        command.current_dir(dunce::simplified(cwd));
    }
    command.envs(env);
    Ok(command)
}

fn spawn(command: &mut Command, cmd: &[String]) -> Result<Child, ProcessError> {
    log::debug!("Spawning: {}", display_command(cmd));
    command.spawn().map_err(|source| ProcessError::Spawn {
        command: display_command(cmd),
        source,
    })
}

fn stdio_for(spec: StdioSpec) -> Stdio {
    match spec {
        StdioSpec::Pipe => Stdio::piped(),
        StdioSpec::Inherit => Stdio::inherit(),
        StdioSpec::Null => Stdio::null(),
    }
}

fn spawn_piped(cmd: &[String], options: &ProcessOptions) -> Result<ProcessOutput, ProcessError> {
    let mut merged_reader = None;

    // The command holds the parent's copies of any pipe ends handed to the
    // child, so it must be dropped before the merged pipe can reach EOF.
    let mut child = {
        let mut command = base_command(cmd, options.cwd.as_deref(), &options.env)?;
        if options.env_clear {
            command.env_clear();
            command.envs(&options.env);
        }
        for key in &options.env_remove {
            command.env_remove(key);
        }
        command.stdin(stdio_for(options.stdin));

        match (options.stderr, options.stdout) {
            (StderrSpec::Stdout, StdioSpec::Pipe) => {
                let (reader, writer) = io::pipe()?;
                command.stdout(writer.try_clone()?);
                command.stderr(writer);
                merged_reader = Some(reader);
            }
            (StderrSpec::Stdout, StdioSpec::Inherit) => {
                command.stdout(Stdio::inherit());
                command.stderr(io::stdout());
            }
            (StderrSpec::Stdout, StdioSpec::Null) => {
                command.stdout(Stdio::null());
                command.stderr(Stdio::null());
            }
            (StderrSpec::Pipe, stdout) => {
                command.stdout(stdio_for(stdout));
                command.stderr(Stdio::piped());
            }
            (StderrSpec::Inherit, stdout) => {
                command.stdout(stdio_for(stdout));
                command.stderr(Stdio::inherit());
            }
            (StderrSpec::Null, stdout) => {
                command.stdout(stdio_for(stdout));
                command.stderr(Stdio::null());
            }
        }

        spawn(&mut command, cmd)?
    };

    let stdin = child.stdin.take();
    let input = options.input.as_deref();

    let (stdout, stderr, status) = std::thread::scope(|scope| -> io::Result<_> {
        // Dropping the pipe without input closes the child's stdin right away.
        if let (Some(mut pipe), Some(bytes)) = (stdin, input) {
            scope.spawn(move || {
                if let Err(e) = pipe.write_all(bytes)
                    && e.kind() != ErrorKind::BrokenPipe
                {
                    log::warn!("Failed to write input to child stdin: {}", e);
                }
            });
        }

        match merged_reader {
            Some(mut reader) => {
                let mut buf = Vec::new();
                reader
                    .read_to_end(&mut buf)
                    .inspect_err(|_| reap(&mut child))?;
                let status = child.wait()?;
                Ok((buf, None, status))
            }
            None => {
                let out = child.wait_with_output()?;
                let stderr = (options.stderr == StderrSpec::Pipe).then_some(out.stderr);
                Ok((out.stdout, stderr, out.status))
            }
        }
    })?;

    let returncode = exit_code(status);
    log::trace!(
        "Command exited with {} ({} bytes stdout).",
        returncode,
        stdout.len()
    );
    Ok(ProcessOutput {
        returncode,
        stdout,
        stderr,
    })
}

#[cfg(unix)]
fn spawn_pty(cmd: &[String], options: &PtyOptions) -> Result<ProcessOutput, ProcessError> {
    use crate::system::pty::PtySession;

    let mut pty = PtySession::open()?;

    let mut child = {
        let mut command = base_command(cmd, options.cwd.as_deref(), &options.env)?;
        command
            .stdin(Stdio::null())
            .stdout(pty.write_stdio()?)
            .stderr(pty.write_stdio()?);
        spawn(&mut command, cmd)?
    };
    pty.close_w();

    let buf = drain_pty(&mut pty).inspect_err(|_| reap(&mut child))?;
    pty.close_r().inspect_err(|_| reap(&mut child))?;

    let returncode = exit_code(child.wait()?);
    Ok(ProcessOutput {
        returncode,
        stdout: buf,
        stderr: None,
    })
}

/// Reads the pty until EOF. Linux reports a hung-up terminal as `EIO`,
/// which is the normal end of output once the child has exited.
#[cfg(unix)]
fn drain_pty(pty: &mut crate::system::pty::PtySession) -> io::Result<Vec<u8>> {
    use crate::constants::PTY_READ_CHUNK_SIZE;
    use nix::errno::Errno;

    let mut buf = Vec::new();
    let mut chunk = [0u8; PTY_READ_CHUNK_SIZE];
    loop {
        let n = match pty.read(&mut chunk) {
            Ok(n) => n,
            Err(e) if e.raw_os_error() == Some(Errno::EIO as i32) => 0,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if n == 0 {
            break;
        }
        buf.extend_from_slice(chunk.get(..n).unwrap_or_default());
    }
    Ok(buf)
}

/// Kills and waits for a child whose output could not be collected, so an
/// early error return does not leave a zombie behind.
fn reap(child: &mut Child) {
    if let Err(e) = child.kill() {
        log::warn!("Failed to kill child {}: {}", child.id(), e);
    }
    if let Err(e) = child.wait() {
        log::warn!("Failed to wait for child {}: {}", child.id(), e);
    }
}

/// Exit code of a finished process; a signal-terminated child reports `-signal`.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Counts calls and never resolves anything.
    struct MissingResolver {
        calls: Cell<usize>,
    }

    impl Resolver for MissingResolver {
        fn normalize(&self, argv: &[String]) -> Resolution {
            self.calls.set(self.calls.get() + 1);
            Resolution::NotFound(ProcessOutput::synthetic(
                1,
                format!("Executable `{}` not found", argv.join(" ")),
            ))
        }
    }

    fn missing() -> Runner<MissingResolver> {
        Runner::with_resolver(MissingResolver {
            calls: Cell::new(0),
        })
    }

    #[test]
    fn test_empty_command_is_rejected() {
        let empty: [&str; 0] = [];
        let result = cmd_output_b(&empty, &ProcessOptions::default());
        assert!(matches!(result, Err(ProcessError::EmptyCommand)));
    }

    #[test]
    fn test_not_found_without_expectation_returns_synthetic_result() {
        let runner = missing();
        let out = runner
            .output_bytes(&["nope", "x"], &ProcessOptions::new().any_retcode())
            .unwrap();
        assert_eq!(out.returncode, 1);
        assert_eq!(out.stdout, b"Executable `nope x` not found".to_vec());
        assert_eq!(out.stderr, None);
        assert_eq!(runner.resolver().calls.get(), 1);
    }

    #[test]
    fn test_not_found_with_default_expectation_raises() {
        let err = missing()
            .output_bytes(&["nope"], &ProcessOptions::default())
            .unwrap_err();
        match err {
            ProcessError::CalledProcess(e) => {
                assert_eq!(e.cmd(), &["nope".to_string()]);
                assert_eq!(e.returncode(), 1);
                assert_eq!(e.expected_returncode(), 0);
                assert_eq!(e.stderr(), None);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_not_found_in_pty_mode_returns_synthetic_result() {
        let runner = missing();
        let out = runner.output_pty(&["nope"], &PtyOptions::default()).unwrap();
        assert_eq!(out.returncode, 1);
        assert_eq!(out.stderr, None);
        assert_eq!(runner.resolver().calls.get(), 1);
    }

    #[test]
    fn test_missing_executable_via_default_resolver() {
        let out = cmd_output(
            &["runcap-no-such-program-anywhere"],
            &ProcessOptions::new().any_retcode(),
        )
        .unwrap();
        assert_eq!(out.returncode, 1);
        assert_eq!(
            out.stdout,
            "Executable `runcap-no-such-program-anywhere` not found"
        );
    }

    #[cfg(unix)]
    mod unix {
        use super::*;

        fn sh(script: &str) -> Vec<String> {
            vec!["sh".to_string(), "-c".to_string(), script.to_string()]
        }

        #[test]
        fn test_reap_leaves_no_running_child() {
            let mut child = Command::new("sleep").arg("30").spawn().unwrap();
            reap(&mut child);
            let status = child.try_wait().unwrap().expect("child was not reaped");
            assert_eq!(exit_code(status), -9);
        }

        #[test]
        fn test_piped_capture_keeps_streams_apart() {
            let out = cmd_output_b(
                &sh("printf 'a\\nb\\n'; printf 'err' >&2"),
                &ProcessOptions::default(),
            )
            .unwrap();
            assert_eq!(out.returncode, 0);
            assert_eq!(out.stdout, b"a\nb\n".to_vec());
            assert_eq!(out.stderr, Some(b"err".to_vec()));
        }

        #[test]
        fn test_mismatched_exit_code_carries_full_context() {
            let argv = sh("echo out; echo err >&2; exit 3");
            let err = cmd_output_b(&argv, &ProcessOptions::default()).unwrap_err();
            let ProcessError::CalledProcess(e) = err else {
                panic!("expected CalledProcess, got {err}");
            };
            assert!(e.cmd()[0].ends_with("sh"));
            assert_eq!(&e.cmd()[1..], &argv[1..]);
            assert_eq!(e.returncode(), 3);
            assert_eq!(e.expected_returncode(), 0);
            assert_eq!(e.stdout(), b"out\n");
            assert_eq!(e.stderr(), Some(&b"err\n"[..]));
            assert!(e.to_string().contains("return code: 3\nexpected return code: 0\n"));
        }

        #[test]
        fn test_no_expectation_never_raises() {
            let out = cmd_output_b(&sh("exit 7"), &ProcessOptions::new().any_retcode()).unwrap();
            assert_eq!(out.returncode, 7);
        }

        #[test]
        fn test_matching_non_zero_expectation_succeeds() {
            let out = cmd_output_b(&sh("exit 2"), &ProcessOptions::new().retcode(Some(2))).unwrap();
            assert_eq!(out.returncode, 2);
        }

        #[test]
        fn test_signal_termination_reports_negative_code() {
            let out =
                cmd_output_b(&sh("kill -9 $$"), &ProcessOptions::new().any_retcode()).unwrap();
            assert_eq!(out.returncode, -9);
        }

        #[test]
        fn test_input_is_written_to_stdin() {
            let out = cmd_output(&["cat"], &ProcessOptions::new().input("hello\nworld")).unwrap();
            assert_eq!(out.stdout, "hello\nworld");
        }

        #[test]
        fn test_stdin_is_closed_without_input() {
            let out = cmd_output(&["cat"], &ProcessOptions::default()).unwrap();
            assert_eq!(out.stdout, "");
        }

        #[test]
        fn test_merged_stderr_in_piped_mode() {
            let out = cmd_output(
                &sh("echo a; echo b >&2; echo c"),
                &ProcessOptions::new().stderr(StderrSpec::Stdout),
            )
            .unwrap();
            assert_eq!(out.stdout, "a\nb\nc\n");
            assert_eq!(out.stderr, None);
        }

        #[test]
        fn test_uncaptured_stderr_is_absent() {
            let out = cmd_output_b(
                &sh("echo hidden >&2"),
                &ProcessOptions::new().stderr(StdioSpec::Null),
            )
            .unwrap();
            assert_eq!(out.stderr, None);
        }

        #[test]
        fn test_cwd_and_env_are_applied() {
            let dir = tempfile::tempdir().unwrap();
            let out = cmd_output(
                &sh("echo \"$RUNCAP_TEST_VAR\"; pwd -P"),
                &ProcessOptions::new()
                    .cwd(dir.path())
                    .env("RUNCAP_TEST_VAR", "value"),
            )
            .unwrap();
            let expected_dir = std::fs::canonicalize(dir.path()).unwrap();
            assert_eq!(
                out.stdout,
                format!("value\n{}\n", expected_dir.display())
            );
        }

        #[test]
        fn test_env_clear_drops_inherited_variables() {
            let sh_path = crate::system::resolver::find_executable("sh").unwrap();
            let sh_path = sh_path.to_string_lossy().into_owned();
            let out = cmd_output(
                &[sh_path.as_str(), "-c", "echo \"[$HOME][$KEPT]\""],
                &ProcessOptions::new().env_clear().env("KEPT", "yes"),
            )
            .unwrap();
            assert_eq!(out.stdout, "[][yes]\n");
        }

        #[test]
        fn test_text_and_bytes_agree_for_utf8_output() {
            let argv = sh("printf 'h\\303\\251llo\\n'; printf '\\342\\234\\223' >&2");
            let bytes = cmd_output_b(&argv, &ProcessOptions::default()).unwrap();
            let text = cmd_output(&argv, &ProcessOptions::default()).unwrap();
            assert_eq!(text.returncode, bytes.returncode);
            assert_eq!(text.stdout.as_bytes(), bytes.stdout.as_slice());
            assert_eq!(
                text.stderr.as_deref().map(str::as_bytes),
                bytes.stderr.as_deref()
            );
            assert_eq!(text.stdout, "héllo\n");
        }

        #[test]
        fn test_invalid_utf8_in_text_mode_is_an_error() {
            let result = cmd_output(&sh("printf '\\377'"), &ProcessOptions::default());
            assert!(matches!(result, Err(ProcessError::InvalidUtf8 { .. })));
        }

        #[test]
        fn test_pty_capture_does_not_inject_carriage_returns() {
            let out = cmd_output_p(&sh("printf 'a\\nb\\n'"), &PtyOptions::default()).unwrap();
            assert_eq!(out.returncode, 0);
            assert_eq!(out.stdout, b"a\nb\n".to_vec());
            assert_eq!(out.stderr, None);
        }

        #[test]
        fn test_pty_capture_merges_stderr() {
            let out = cmd_output_p(
                &sh("echo stdout; echo stderr >&2"),
                &PtyOptions::default(),
            )
            .unwrap();
            let text = String::from_utf8(out.stdout).unwrap();
            assert!(text.contains("stdout\n"));
            assert!(text.contains("stderr\n"));
            assert_eq!(out.stderr, None);
        }

        #[test]
        fn test_pty_accepts_any_exit_code() {
            let out = cmd_output_p(&sh("exit 5"), &PtyOptions::default()).unwrap();
            assert_eq!(out.returncode, 5);
            assert!(out.stdout.is_empty());
        }

        #[test]
        fn test_pty_attaches_a_terminal_and_applies_env() {
            let out = cmd_output_p(
                &sh("test -t 1 && echo \"tty $RUNCAP_PTY_VAR\""),
                &PtyOptions::new().env("RUNCAP_PTY_VAR", "ok"),
            )
            .unwrap();
            assert_eq!(out.stdout, b"tty ok\n".to_vec());
        }

        #[test]
        fn test_pty_captures_output_larger_than_one_chunk() {
            let out = cmd_output_p(
                &sh("i=0; while [ $i -lt 2000 ]; do echo 0123456789; i=$((i+1)); done"),
                &PtyOptions::default(),
            )
            .unwrap();
            assert_eq!(out.stdout.len(), 2000 * 11);
            assert!(!out.stdout.contains(&b'\r'));
        }
    }
}
