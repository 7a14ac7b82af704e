//! Answer Synthesizer
//!
//! Summarizes result rows in natural language. A failed completion here never
//! fails the request: the caller still gets the statement and rows.

use crate::db::Row;
use crate::llm::TextCompletion;
use crate::prompts::answer_prompt;
use tracing::warn;

pub struct AnswerSynthesizer {
    preview_chars: usize,
}

impl AnswerSynthesizer {
    pub fn new(preview_chars: usize) -> Self {
        Self { preview_chars }
    }

    /// JSON rendering of the rows, cut to at most `preview_chars` characters.
    pub fn preview(&self, rows: &[Row]) -> String {
        let full = serde_json::to_string(rows).unwrap_or_else(|_| "[]".to_string());
        match full.char_indices().nth(self.preview_chars) {
            Some((cut, _)) => full[..cut].to_string(),
            None => full,
        }
    }

    pub async fn answer(&self, completion: &dyn TextCompletion, question: &str, rows: &[Row]) -> String {
        let prompt = answer_prompt(question, &self.preview(rows));
        match completion.complete(&prompt).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!(error = %e, "Answer generation failed, returning placeholder");
                format!("(Answer generation failed: {})", e)
            }
        }
    }
}
