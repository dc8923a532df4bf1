//! Interactive confirmation before sending.

use std::io::BufRead;

/// What is about to be sent, or what was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendSummary {
    pub subject: String,
    /// Article path relative to the workbench.
    pub article: String,
    pub recipients: Vec<String>,
}

/// Asks the user whether to go ahead.
pub trait Confirm: Send + Sync {
    fn confirm(&self, summary: &SendSummary) -> bool;
}

/// Prompts on stderr and reads the answer from stdin.
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, summary: &SendSummary) -> bool {
        eprintln!("Send this email?");
        eprintln!("   Subject:  {}", summary.subject);
        eprintln!("   Markdown: {}", summary.article);
        eprintln!("   To:       {}", summary.recipients.join(", "));
        eprint!("Press y or Enter to send, anything else to cancel: ");

        let mut answer = String::new();
        match std::io::stdin().lock().read_line(&mut answer) {
            Ok(_) => is_yes(&answer),
            Err(e) => {
                tracing::error!("Error reading stdin: {}", e);
                false
            }
        }
    }
}

/// An empty answer or one starting with `y` confirms.
pub fn is_yes(answer: &str) -> bool {
    let answer = answer.trim();
    answer.is_empty() || answer.starts_with(['y', 'Y'])
}
