use std::io::Write;
use std::process::{Command, Stdio};

fn run_shell(lines: &[&str]) -> std::process::Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_posh"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn posh");

    {
        let stdin = child.stdin.as_mut().expect("stdin");
        for line in lines {
            writeln!(stdin, "{line}").expect("write line");
        }
        writeln!(stdin, "exit").expect("write exit");
    }

    child.wait_with_output().expect("wait output")
}

#[test]
fn builtin_to_external_pipeline_outputs() {
    let output = run_shell(&["echo hello | sort"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("hello"), "stdout was: {stdout}");
}

#[test]
fn quoted_echo_preserves_internal_spacing() {
    let output = run_shell(&["echo 'a   b'"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("a   b"), "stdout was: {stdout}");
}

#[test]
fn stdout_redirect_truncates_file() {
    let dir = std::env::temp_dir().join(format!("posh_redirect_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("out.txt");
    std::fs::write(&path, "stale content").unwrap();

    run_shell(&[&format!("echo fresh > {}", path.display())]);

    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(contents.trim(), "fresh");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn append_redirect_keeps_prior_content() {
    let dir = std::env::temp_dir().join(format!("posh_append_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("log.txt");

    run_shell(&[
        &format!("echo one > {}", path.display()),
        &format!("echo two 1>> {}", path.display()),
    ]);

    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(contents.lines().collect::<Vec<_>>(), vec!["one", "two"]);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn type_reports_builtin_before_path() {
    let output = run_shell(&["type cd"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("cd is a shell builtin"), "stdout was: {stdout}");
}

#[test]
fn type_reports_not_found_for_unknown_command() {
    let output = run_shell(&["type definitely_not_a_real_command_xyz"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("definitely_not_a_real_command_xyz: not found"),
        "stdout was: {stdout}"
    );
}

#[test]
fn command_not_found_reports_and_continues() {
    let output = run_shell(&["definitely_not_a_real_command_xyz", "echo still alive"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stderr.contains("command not found"), "stderr was: {stderr}");
    assert!(stdout.contains("still alive"), "stdout was: {stdout}");
}

#[test]
fn unterminated_quote_falls_back_to_whitespace_split() {
    let output = run_shell(&["echo 'abc"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("'abc"), "stdout was: {stdout}");
}

#[test]
fn exit_with_explicit_code_is_the_process_exit_status() {
    let output = run_shell(&["exit 3"]);
    assert_eq!(output.status.code(), Some(3));
}

#[cfg(unix)]
#[test]
fn external_pipeline_relays_stdout_between_stages() {
    let output = run_shell(&["printf 'b\\na\\n' | sort"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().filter(|l| *l == "a" || *l == "b").collect();
    assert_eq!(lines, vec!["a", "b"]);
}
