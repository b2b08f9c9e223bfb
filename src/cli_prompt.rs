use std::io::{BufRead, Write};

use color_eyre::Result;

use crate::ports::prompt::Prompter;

/// Questions on stdout, answers from stdin.
pub struct StdinPrompter;

fn ask(message: &str) -> Result<String> {
    let mut stdout = std::io::stdout().lock();
    write!(stdout, "{message} ")?;
    stdout.flush()?;

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

pub fn parse_confirmation(answer: &str) -> bool {
    matches!(answer.to_lowercase().as_str(), "y" | "yes")
}

#[async_trait::async_trait]
impl Prompter for StdinPrompter {
    async fn confirm(&self, message: &str) -> Result<bool> {
        let message = format!("{message} [y/N]");
        let answer = tokio::task::spawn_blocking(move || ask(&message)).await??;
        Ok(parse_confirmation(&answer))
    }

    async fn input(&self, message: &str) -> Result<Option<String>> {
        let message = format!("{message}:");
        let answer = tokio::task::spawn_blocking(move || ask(&message)).await??;
        Ok(Some(answer).filter(|answer| !answer.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_confirmation() {
        assert!(parse_confirmation("y"));
        assert!(parse_confirmation("YES"));
        assert!(!parse_confirmation(""));
        assert!(!parse_confirmation("nope"));
    }
}
