//! Console implementations of the operator prompts

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use installer::{ConfirmDialog, FolderPrompt, PlatformRef};

/// Asks questions on stdout and reads answers from stdin
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsolePrompt;

fn read_answer(prompt: &str) -> Option<String> {
    let mut stdout = io::stdout();
    write!(stdout, "{}", prompt).ok()?;
    stdout.flush().ok()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).ok()?;
    Some(line.trim().to_string())
}

async fn ask(prompt: String) -> Option<String> {
    tokio::task::spawn_blocking(move || read_answer(&prompt))
        .await
        .ok()
        .flatten()
}

/// Interpret an executable pick: empty keeps the preferred one, `0` cancels
fn parse_choice(input: &str, candidates: &[PathBuf], preferred: &Path) -> Option<PathBuf> {
    let input = input.trim();
    if input.is_empty() {
        return Some(preferred.to_path_buf());
    }
    match input.parse::<usize>() {
        Ok(0) | Err(_) => None,
        Ok(n) => candidates.get(n - 1).cloned(),
    }
}

#[async_trait]
impl ConfirmDialog for ConsolePrompt {
    async fn confirm(&self, title: &str, message: &str, detail: &str) -> bool {
        let prompt = format!("\n{}\n{}\n  {}\n[y/N] ", title, message, detail);
        matches!(
            ask(prompt).await.as_deref(),
            Some("y") | Some("Y") | Some("yes") | Some("Yes")
        )
    }

    async fn choose_executable(&self, candidates: &[PathBuf], preferred: &Path) -> Option<PathBuf> {
        let mut prompt = String::from("\nSeveral executables were found:\n");
        let mut default_index = 1;
        for (index, candidate) in candidates.iter().enumerate() {
            let marker = if candidate == preferred {
                default_index = index + 1;
                "*"
            } else {
                " "
            };
            prompt.push_str(&format!("{} {:>2}) {}\n", marker, index + 1, candidate.display()));
        }
        prompt.push_str(&format!("Select executable [{}], 0 to cancel: ", default_index));

        let answer = ask(prompt).await?;
        parse_choice(&answer, candidates, preferred)
    }
}

#[async_trait]
impl FolderPrompt for ConsolePrompt {
    async fn ask_folder(&self, platform: &PlatformRef) -> Option<PathBuf> {
        let answer = ask(format!("\nNo install folder configured for {}. Folder: ", platform)).await?;
        (!answer.is_empty()).then(|| PathBuf::from(answer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choice_parsing() {
        let candidates = vec![PathBuf::from("a.exe"), PathBuf::from("b.exe")];
        let preferred = Path::new("b.exe");

        assert_eq!(parse_choice("", &candidates, preferred), Some(PathBuf::from("b.exe")));
        assert_eq!(parse_choice(" 1 ", &candidates, preferred), Some(PathBuf::from("a.exe")));
        assert_eq!(parse_choice("0", &candidates, preferred), None);
        assert_eq!(parse_choice("3", &candidates, preferred), None);
        assert_eq!(parse_choice("abc", &candidates, preferred), None);
    }
}
