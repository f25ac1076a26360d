//! Terminal answers for the sign-in prompts.

use claimer::{ClaimError, PromptKind, Prompter};
use std::io::{BufRead, IsTerminal, Write};

/// Asks on the controlling terminal. Without one every prompt is skipped, so
/// unattended runs fall back to configured values.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompter;

#[async_trait::async_trait]
impl Prompter for TerminalPrompter {
    async fn prompt(&self, message: &str, kind: PromptKind) -> Result<Option<String>, ClaimError> {
        if !std::io::stdin().is_terminal() {
            return Ok(None);
        }
        let message = message.to_string();
        let answer = tokio::task::spawn_blocking(move || read_answer(&message, kind))
            .await
            .map_err(|e| ClaimError::InvalidArgument(format!("Prompt task failed: {e}")))??;
        let answer = answer.trim().to_string();
        Ok((!answer.is_empty()).then_some(answer))
    }
}

fn read_answer(message: &str, kind: PromptKind) -> Result<String, ClaimError> {
    match kind {
        PromptKind::Password => Ok(rpassword::prompt_password(format!("{message}: "))?),
        PromptKind::Text => {
            let mut stderr = std::io::stderr();
            write!(stderr, "{message}: ")?;
            stderr.flush()?;
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            Ok(line)
        }
    }
}
