mod builtins;
mod editor;
mod executor;
mod history;
mod pipeline;
mod status;
mod token;

use std::io;
use std::sync::atomic::Ordering;

use builtins::ShellContext;
use editor::{EDITOR_ACTIVE, LineEditor};
use executor::ExecutionOutcome;

const PROMPT: &str = "$ ";

fn main() {
    // SIGINT during raw-mode editing never reaches here on Unix (ISIG is
    // off, so Ctrl-C arrives as a key event instead); this handler only
    // fires while a foreground child has the terminal or during the
    // non-TTY fallback read path.
    ctrlc::set_handler(|| {
        if !EDITOR_ACTIVE.load(Ordering::Relaxed) {
            println!();
            let _ = io::Write::flush(&mut io::stdout());
        }
    })
    .expect("failed to install SIGINT handler");

    let mut editor = LineEditor::new();
    let mut last_exit_code: i32 = 0;

    let final_code = loop {
        let line = match editor.read_line(PROMPT) {
            Ok(Some(line)) => line,
            Ok(None) => break 0,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                eprintln!("posh: {e}");
                break 1;
            }
        };

        editor.add_to_history(&line);

        let pipeline = match pipeline::parse_line(&line) {
            Ok(Some(pipeline)) => pipeline,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("{e}");
                last_exit_code = 2;
                continue;
            }
        };

        let ctx = ShellContext {
            history: editor.history(),
        };
        match executor::execute_pipeline(&pipeline.segments, &ctx) {
            ExecutionOutcome::Continue(code) => last_exit_code = code,
            ExecutionOutcome::Exit(code) => break code,
        }
    };

    history::save(editor.history());
    std::process::exit(final_code);
}
