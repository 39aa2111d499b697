use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// The fixed set of builtin command names. Matched before PATH lookup.
const BUILTINS: &[&str] = &["exit", "echo", "type", "pwd", "cd", "history"];

/// Returns true if `name` is a shell builtin — never searched on PATH.
pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// Ambient state a builtin needs beyond its arguments and streams.
/// `cd`/`pwd` talk to `std::env`/`std::env::current_dir` directly; the only
/// extra context any builtin needs is the history buffer, for `history`.
pub struct ShellContext<'a> {
    pub history: &'a [String],
}

/// What the shell should do after a builtin returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinOutcome {
    Continue(i32),
    Exit(i32),
}

/// Run a builtin, writing to the provided streams and returning what the
/// shell should do next. `program` must satisfy [`is_builtin`].
pub fn execute(
    program: &str,
    args: &[String],
    stdin: &mut dyn Read,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
    ctx: &ShellContext,
) -> BuiltinOutcome {
    let _ = stdin; // none of these builtins read stdin
    match program {
        "exit" => builtin_exit(args, stderr),
        "echo" => BuiltinOutcome::Continue(builtin_echo(args, stdout)),
        "type" => BuiltinOutcome::Continue(builtin_type(args, stdout)),
        "pwd" => BuiltinOutcome::Continue(builtin_pwd(stdout, stderr)),
        "cd" => BuiltinOutcome::Continue(builtin_cd(args, stderr)),
        "history" => BuiltinOutcome::Continue(builtin_history(ctx, stdout)),
        _ => unreachable!("execute() called with non-builtin program {program:?}"),
    }
}

fn builtin_exit(args: &[String], stderr: &mut dyn Write) -> BuiltinOutcome {
    match args.first() {
        None => BuiltinOutcome::Exit(0),
        Some(s) => match s.parse::<i32>() {
            Ok(code) => BuiltinOutcome::Exit(code.rem_euclid(256)),
            Err(_) => {
                let _ = writeln!(stderr, "posh: exit: {s}: numeric argument required");
                BuiltinOutcome::Continue(2)
            }
        },
    }
}

fn builtin_echo(args: &[String], stdout: &mut dyn Write) -> i32 {
    let _ = writeln!(stdout, "{}", args.join(" "));
    0
}

fn builtin_type(args: &[String], stdout: &mut dyn Write) -> i32 {
    let mut exit_code = 0;
    for arg in args {
        if is_builtin(arg) {
            let _ = writeln!(stdout, "{arg} is a shell builtin");
        } else {
            match find_in_path(arg) {
                Some(path) => {
                    let _ = writeln!(stdout, "{arg} is {}", path.display());
                }
                None => {
                    let _ = writeln!(stdout, "{arg}: not found");
                    exit_code = 1;
                }
            }
        }
    }
    exit_code
}

fn builtin_pwd(stdout: &mut dyn Write, stderr: &mut dyn Write) -> i32 {
    match std::env::current_dir() {
        Ok(path) => {
            let _ = writeln!(stdout, "{}", path.display());
            0
        }
        Err(e) => {
            let _ = writeln!(stderr, "pwd: {e}");
            1
        }
    }
}

fn builtin_cd(args: &[String], stderr: &mut dyn Write) -> i32 {
    let requested = args.first().map(String::as_str);
    let target = match requested {
        Some("-") => std::env::var("OLDPWD")
            .ok()
            .or_else(|| std::env::current_dir().ok().map(|p| p.display().to_string())),
        Some(dir) => Some(expand_tilde(dir)),
        None => home_dir(),
    };

    let Some(target) = target else {
        let label = requested.unwrap_or("~");
        let _ = writeln!(stderr, "cd: {label}: No such file or directory");
        return 1;
    };

    let Ok(previous) = std::env::current_dir() else {
        let _ = writeln!(stderr, "cd: {target}: No such file or directory");
        return 1;
    };

    if std::env::set_current_dir(&target).is_err() {
        let label = requested.unwrap_or(target.as_str());
        let _ = writeln!(stderr, "cd: {label}: No such file or directory");
        return 1;
    }

    // SAFETY: env mutation happens only from the single-threaded prompt loop.
    unsafe { std::env::set_var("OLDPWD", previous) };
    0
}

fn home_dir() -> Option<String> {
    std::env::var("HOME").ok()
}

/// Expand a leading `~` to `$HOME`, the only expansion this shell performs
/// and scoped entirely to `cd`'s argument — there is no general variable or
/// glob expansion. `~user` forms are left untouched (no username lookup).
fn expand_tilde(path: &str) -> String {
    if path == "~" {
        return home_dir().unwrap_or_else(|| path.to_string());
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = home_dir() {
            return format!("{home}/{rest}");
        }
    }
    path.to_string()
}

fn builtin_history(ctx: &ShellContext, stdout: &mut dyn Write) -> i32 {
    for (i, line) in ctx.history.iter().enumerate() {
        let _ = writeln!(stdout, "    {}  {}", i + 1, line);
    }
    0
}

// ── PATH search, shared by `type`, external dispatch, and completion ──

/// Check if a path points to a regular, executable file.
fn is_executable(path: &Path) -> bool {
    let Ok(meta) = path.metadata() else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o111 != 0
    }

    #[cfg(not(unix))]
    {
        true
    }
}

fn path_dirs() -> Vec<PathBuf> {
    std::env::var("PATH")
        .unwrap_or_default()
        .split(if cfg!(windows) { ';' } else { ':' })
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Search PATH for the first regular, executable file named `cmd`.
pub fn find_in_path(cmd: &str) -> Option<PathBuf> {
    for dir in path_dirs() {
        let candidate = dir.join(cmd);
        if is_executable(&candidate) {
            return Some(candidate);
        }
    }
    None
}

/// Basenames of every executable reachable on PATH. Directories that can't
/// be listed (e.g. permission denied) are skipped silently.
fn path_executables() -> Vec<String> {
    let mut names = Vec::new();
    for dir in path_dirs() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if is_executable(&path) {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    names.push(name.to_string());
                }
            }
        }
    }
    names
}

/// Candidates for completing the command name prefix `prefix`: the sorted
/// union of builtin names and PATH executable basenames, each with a
/// trailing space, per spec §4.5.
pub fn complete_candidates(prefix: &str) -> Vec<String> {
    let mut candidates: Vec<String> = BUILTINS
        .iter()
        .filter(|name| name.starts_with(prefix))
        .map(|name| name.to_string())
        .chain(
            path_executables()
                .into_iter()
                .filter(|name| name.starts_with(prefix)),
        )
        .collect();
    candidates.sort();
    candidates.dedup();
    candidates.into_iter().map(|c| c + " ").collect()
}
