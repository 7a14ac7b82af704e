//! Intent Classifier

use crate::error::{QueryError, Result};
use crate::llm::TextCompletion;
use crate::prompts::intent_prompt;
use serde::Serialize;
use tracing::{info, warn};

pub const GREETING_REPLY: &str = "Hi! I can answer questions about your machines' energy data. How can I help you today?";
pub const HELP_REPLY: &str =
    "I can query your energy data. Ask me about dates, ranges, totals, averages, consumption or the latest readings.";
pub const OTHER_REPLY: &str = "I'm not sure I understood. Can you rephrase?";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    Help,
    DataQuery,
    Other,
    /// The model answered with something outside the label set.
    Unrecognized(String),
}

impl Intent {
    /// Maps a raw completion onto a label: trimmed, lower-cased, with stray
    /// quotes and a trailing period removed.
    pub fn from_label(raw: &str) -> Self {
        let label = raw
            .trim()
            .to_lowercase()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '.')
            .trim()
            .to_string();

        match label.as_str() {
            "greeting" => Intent::Greeting,
            "help" => Intent::Help,
            "data_query" => Intent::DataQuery,
            "other" => Intent::Other,
            _ => Intent::Unrecognized(label),
        }
    }

    /// Fixed reply for intents that never reach the statement pipeline.
    pub fn canned_reply(&self) -> Option<&'static str> {
        match self {
            Intent::Greeting => Some(GREETING_REPLY),
            Intent::Help => Some(HELP_REPLY),
            Intent::Other => Some(OTHER_REPLY),
            Intent::DataQuery | Intent::Unrecognized(_) => None,
        }
    }
}

pub struct IntentClassifier;

impl IntentClassifier {
    pub async fn classify(completion: &dyn TextCompletion, question: &str) -> Result<Intent> {
        let raw = completion
            .complete(&intent_prompt(question))
            .await
            .map_err(|e| QueryError::Classification(e.to_string()))?;

        let intent = Intent::from_label(&raw);
        match &intent {
            Intent::Unrecognized(label) => {
                warn!(label = %label, "Unrecognized intent label, continuing as a data query")
            }
            other => info!(intent = ?other, "Classified question"),
        }
        Ok(intent)
    }
}
