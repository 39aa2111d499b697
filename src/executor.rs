use std::fs::{File, OpenOptions};
use std::io::{self, Cursor, Read, Write};
use std::process::{Command, Stdio};

use os_pipe::{PipeReader, PipeWriter, pipe};

use crate::builtins::{self, ShellContext};
use crate::pipeline::Segment;
use crate::status;

/// What the shell should do after running a line's worth of pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Continue(i32),
    Exit(i32),
}

/// Run every segment of `segments` (already pipe-joined), wiring stdio
/// between stages and applying each segment's redirections. `exit` inside a
/// multi-segment pipeline is rejected outright — there is no well-defined
/// way for a mid-pipeline exit to terminate the shell, so this mirrors the
/// restriction the reference implementation's pipeline handling makes.
pub fn execute_pipeline(segments: &[Segment], ctx: &ShellContext) -> ExecutionOutcome {
    if segments.len() > 1 && segments.iter().any(|s| s.program() == "exit") {
        eprintln!("posh: exit: not supported in the middle of a pipeline");
        return ExecutionOutcome::Continue(1);
    }

    if segments.len() == 1 {
        return run_segment_standalone(&segments[0], ctx);
    }

    run_pipeline(segments, ctx)
}

fn run_segment_standalone(segment: &Segment, ctx: &ShellContext) -> ExecutionOutcome {
    let redirs = match RedirectFiles::open(&segment.redirs) {
        Ok(redirs) => redirs,
        Err(msg) => {
            eprintln!("{msg}");
            return ExecutionOutcome::Continue(1);
        }
    };

    if builtins::is_builtin(segment.program()) {
        let mut stdin = io::stdin();
        let mut stdout = redirs.stdout_writer();
        let mut stderr = redirs.stderr_writer();
        let outcome = builtins::execute(
            segment.program(),
            segment.args(),
            &mut stdin,
            stdout.as_mut(),
            stderr.as_mut(),
            ctx,
        );
        let _ = stdout.flush();
        let _ = stderr.flush();
        return match outcome {
            builtins::BuiltinOutcome::Continue(code) => ExecutionOutcome::Continue(code),
            builtins::BuiltinOutcome::Exit(code) => ExecutionOutcome::Exit(code),
        };
    }

    let mut command = Command::new(segment.program());
    command.args(segment.args());
    command.stdin(Stdio::inherit());
    command.stdout(redirs.stdout_stdio());
    command.stderr(redirs.stderr_stdio());
    reset_child_signals(&mut command);

    match command.spawn() {
        Ok(mut child) => match child.wait() {
            Ok(status) => ExecutionOutcome::Continue(status::exit_code(status)),
            Err(e) => {
                eprintln!("posh: {}: {e}", segment.program());
                ExecutionOutcome::Continue(1)
            }
        },
        Err(e) => ExecutionOutcome::Continue(command_error(segment.program(), &e)),
    }
}

/// Multi-segment pipeline. A boundary between two builtins is a plain
/// in-memory buffer; any boundary touching an external segment is a real OS
/// pipe, since the external child needs a genuine file descriptor.
///
/// Builtins run synchronously to completion before the next stage is
/// spawned — there is no job control or background execution in scope, so
/// nothing needs a downstream reader running concurrently. The one
/// consequence: a non-last builtin whose output crosses a real pipe into an
/// external consumer writes before that consumer is spawned, so output
/// larger than the OS pipe buffer could block. Acceptable for this scope.
fn run_pipeline(segments: &[Segment], ctx: &ShellContext) -> ExecutionOutcome {
    enum Stdin {
        Inherit,
        Pipe(PipeReader),
        Buffer(Cursor<Vec<u8>>),
    }

    let mut next_stdin = Stdin::Inherit;
    let mut children: Vec<std::process::Child> = Vec::new();
    let mut last_status = 0;
    let mut last_is_external = false;

    for (idx, segment) in segments.iter().enumerate() {
        let is_last = idx + 1 == segments.len();
        let this_is_builtin = builtins::is_builtin(segment.program());
        let next_is_builtin = segments
            .get(idx + 1)
            .map(|s| builtins::is_builtin(s.program()));
        let boundary_is_buffered = !is_last && this_is_builtin && next_is_builtin == Some(true);

        let redirs = match RedirectFiles::open(&segment.redirs) {
            Ok(redirs) => redirs,
            Err(msg) => {
                eprintln!("{msg}");
                wait_all(&mut children);
                return ExecutionOutcome::Continue(1);
            }
        };

        if this_is_builtin {
            let mut stdin: Box<dyn Read> = match std::mem::replace(&mut next_stdin, Stdin::Inherit)
            {
                Stdin::Inherit => Box::new(io::stdin()),
                Stdin::Pipe(reader) => Box::new(reader),
                Stdin::Buffer(cursor) => Box::new(cursor),
            };

            let mut out_buf: Vec<u8> = Vec::new();
            let mut pipe_writer: Option<PipeWriter> = None;
            let outcome;
            {
                let mut stdout: Box<dyn Write> = if redirs.stdout.is_some() {
                    redirs.stdout_writer()
                } else if is_last {
                    Box::new(io::stdout())
                } else if boundary_is_buffered {
                    Box::new(&mut out_buf)
                } else {
                    match pipe() {
                        Ok((reader, writer)) => {
                            next_stdin = Stdin::Pipe(reader);
                            pipe_writer = Some(writer);
                            Box::new(pipe_writer.as_mut().unwrap())
                        }
                        Err(e) => {
                            eprintln!("posh: failed to create pipe: {e}");
                            wait_all(&mut children);
                            return ExecutionOutcome::Continue(1);
                        }
                    }
                };
                let mut stderr = redirs.stderr_writer();
                outcome = builtins::execute(
                    segment.program(),
                    segment.args(),
                    stdin.as_mut(),
                    stdout.as_mut(),
                    stderr.as_mut(),
                    ctx,
                );
                let _ = stdout.flush();
                let _ = stderr.flush();
            }
            drop(pipe_writer); // close writer so the next stage's reader sees EOF

            if boundary_is_buffered {
                next_stdin = Stdin::Buffer(Cursor::new(out_buf));
            }

            last_is_external = false;
            last_status = match outcome {
                builtins::BuiltinOutcome::Continue(code) => code,
                builtins::BuiltinOutcome::Exit(code) => {
                    wait_all(&mut children);
                    return ExecutionOutcome::Exit(code);
                }
            };
        } else {
            let stdin_stdio = match std::mem::replace(&mut next_stdin, Stdin::Inherit) {
                Stdin::Inherit => Stdio::inherit(),
                Stdin::Pipe(reader) => Stdio::from(reader),
                Stdin::Buffer(cursor) => {
                    // An upstream builtin's output is headed into an external
                    // consumer; materialize it through a real pipe.
                    match pipe() {
                        Ok((reader, mut writer)) => {
                            let _ = writer.write_all(cursor.get_ref());
                            drop(writer);
                            Stdio::from(reader)
                        }
                        Err(e) => {
                            eprintln!("posh: failed to create pipe: {e}");
                            wait_all(&mut children);
                            return ExecutionOutcome::Continue(1);
                        }
                    }
                }
            };

            let stdout_stdio = if redirs.stdout.is_some() {
                redirs.stdout_stdio()
            } else if is_last {
                Stdio::inherit()
            } else {
                match pipe() {
                    Ok((reader, writer)) => {
                        next_stdin = Stdin::Pipe(reader);
                        Stdio::from(writer)
                    }
                    Err(e) => {
                        eprintln!("posh: failed to create pipe: {e}");
                        wait_all(&mut children);
                        return ExecutionOutcome::Continue(1);
                    }
                }
            };

            let mut command = Command::new(segment.program());
            command.args(segment.args());
            command.stdin(stdin_stdio);
            command.stdout(stdout_stdio);
            command.stderr(redirs.stderr_stdio());
            reset_child_signals(&mut command);

            match command.spawn() {
                Ok(child) => {
                    last_is_external = true;
                    if is_last {
                        last_status = 0; // replaced after wait below
                    }
                    children.push(child);
                }
                Err(e) => {
                    let code = command_error(segment.program(), &e);
                    wait_all(&mut children);
                    return ExecutionOutcome::Continue(code);
                }
            }
        }
    }

    if let Some(last_child) = children.last_mut() {
        match last_child.wait() {
            Ok(status) if last_is_external => last_status = status::exit_code(status),
            Ok(_) => {}
            Err(_) => last_status = 1,
        }
    }
    // Drain the rest so no zombies linger; their exit codes don't count.
    for child in children.iter_mut().rev().skip(1) {
        let _ = child.wait();
    }

    ExecutionOutcome::Continue(last_status)
}

fn wait_all(children: &mut [std::process::Child]) {
    for child in children.iter_mut() {
        let _ = child.wait();
    }
}

/// Resolves a segment's redirections into real file handles. Every target is
/// opened (and truncated/appended) as it's encountered, in order; only the
/// last file per fd is kept as the active handle, matching source-observable
/// behavior for `cmd > a > b` (both `a` and `b` are created, only `b` is
/// written to).
struct RedirectFiles {
    stdout: Option<File>,
    stderr: Option<File>,
}

impl RedirectFiles {
    fn open(redirs: &[crate::pipeline::Redirection]) -> Result<Self, String> {
        let mut stdout = None;
        let mut stderr = None;
        for redir in redirs {
            let file = open_target(&redir.target, redir.append)
                .map_err(|e| format!("posh: {}: {e}", redir.target))?;
            match redir.fd {
                1 => stdout = Some(file),
                2 => stderr = Some(file),
                fd => unreachable!("redirection fd is always 1 or 2, got {fd}"),
            }
        }
        Ok(RedirectFiles { stdout, stderr })
    }

    fn stdout_writer(&self) -> Box<dyn Write> {
        match &self.stdout {
            Some(file) => Box::new(file.try_clone().expect("redirect file clone")),
            None => Box::new(io::stdout()),
        }
    }

    fn stderr_writer(&self) -> Box<dyn Write> {
        match &self.stderr {
            Some(file) => Box::new(file.try_clone().expect("redirect file clone")),
            None => Box::new(io::stderr()),
        }
    }

    fn stdout_stdio(&self) -> Stdio {
        match &self.stdout {
            Some(file) => Stdio::from(file.try_clone().expect("redirect file clone")),
            None => Stdio::inherit(),
        }
    }

    fn stderr_stdio(&self) -> Stdio {
        match &self.stderr {
            Some(file) => Stdio::from(file.try_clone().expect("redirect file clone")),
            None => Stdio::inherit(),
        }
    }
}

fn open_target(path: &str, append: bool) -> io::Result<File> {
    if append {
        OpenOptions::new().create(true).append(true).open(path)
    } else {
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
    }
}

/// On Unix, reset signals the shell's interactive line editor may have
/// altered (SIGINT is handled by `ctrlc` at the prompt) back to their
/// default disposition before the child execs, so a foreground child
/// responds normally to Ctrl-C.
fn reset_child_signals(command: &mut Command) {
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        unsafe {
            command.pre_exec(|| {
                for &sig in &[libc::SIGINT, libc::SIGQUIT, libc::SIGPIPE] {
                    if libc::signal(sig, libc::SIG_DFL) == libc::SIG_ERR {
                        return Err(io::Error::last_os_error());
                    }
                }
                Ok(())
            });
        }
    }
    #[cfg(not(unix))]
    {
        let _ = command;
    }
}

/// Map a spawn error to the shell's observable diagnostic and exit code.
fn command_error(program: &str, e: &io::Error) -> i32 {
    if e.kind() == io::ErrorKind::NotFound {
        eprintln!("{program}: command not found");
        127
    } else {
        eprintln!("posh: {program}: {e}");
        126
    }
}
