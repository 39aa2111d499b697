use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

/// Most-recent entries kept when the history file is written.
pub const MAX_HISTORY_SIZE: usize = 500;

/// `$HOME/.shell_history`, or `None` when `HOME` (or `USERPROFILE` on
/// Windows) isn't set.
pub fn file_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .ok()
        .map(|home| PathBuf::from(home).join(".shell_history"))
}

/// Load every line from the history file, oldest first. Missing file or
/// unreadable path yields an empty history rather than an error.
pub fn load() -> Vec<String> {
    let Some(path) = file_path() else {
        return Vec::new();
    };
    let Ok(file) = File::open(&path) else {
        return Vec::new();
    };
    BufReader::new(file)
        .lines()
        .map_while(Result::ok)
        .filter(|line| !line.is_empty())
        .collect()
}

/// Overwrite the history file with the most recent [`MAX_HISTORY_SIZE`]
/// entries. Called once, on shell exit — matching a readline-style session
/// that keeps the full list in memory and truncates only when persisting.
pub fn save(entries: &[String]) {
    let Some(path) = file_path() else {
        return;
    };
    let start = entries.len().saturating_sub(MAX_HISTORY_SIZE);
    let Ok(mut file) = File::create(&path) else {
        return;
    };
    for line in &entries[start..] {
        let _ = writeln!(file, "{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn save_truncates_to_max_size() {
        let dir = std::env::temp_dir().join(format!(
            "posh-history-test-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        // SAFETY: test runs single-threaded with respect to this env var.
        unsafe { std::env::set_var("HOME", &dir) };

        let entries: Vec<String> = (0..MAX_HISTORY_SIZE + 10)
            .map(|i| format!("cmd-{i}"))
            .collect();
        save(&entries);

        let mut contents = String::new();
        File::open(file_path().unwrap())
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        let saved: Vec<&str> = contents.lines().collect();
        assert_eq!(saved.len(), MAX_HISTORY_SIZE);
        assert_eq!(saved.last().unwrap(), &format!("cmd-{}", MAX_HISTORY_SIZE + 9));

        std::fs::remove_dir_all(&dir).ok();
    }
}
