//! Generative Synthesizer
//!
//! Fallback for questions the deterministic rules do not recognize. The model
//! receives the schema, the rule set and the few-shot examples, and the last
//! SELECT line of its answer becomes the candidate statement.

use crate::error::{QueryError, Result};
use crate::llm::TextCompletion;
use crate::prompts::SqlPromptBuilder;
use crate::schema::SchemaRegistry;
use crate::statement::Statement;
use tracing::{debug, info};

pub struct GenerativeSynthesizer {
    prompts: SqlPromptBuilder,
}

impl GenerativeSynthesizer {
    pub fn new(schema: &'static SchemaRegistry, default_year: i32) -> Self {
        Self { prompts: SqlPromptBuilder::new(schema, default_year) }
    }

    pub fn prompt_for(&self, question: &str) -> String {
        self.prompts.build(question)
    }

    pub async fn synthesize(&self, completion: &dyn TextCompletion, question: &str) -> Result<Statement> {
        let prompt = self.prompt_for(question);
        debug!(prompt = %prompt, "Statement synthesis prompt");

        let raw = completion
            .complete(&prompt)
            .await
            .map_err(|e| QueryError::Synthesis(e.to_string()))?;

        let sql = extract_candidate(&raw).ok_or_else(|| {
            QueryError::Synthesis(format!("No SELECT statement in model response: {}", raw.trim()))
        })?;
        info!(sql = %sql, "Generated statement");
        Ok(Statement::generative(sql))
    }
}

/// Last non-empty line that starts with `select` (any case), without trailing
/// terminators. Commentary the model puts before or after it is ignored.
pub fn extract_candidate(response: &str) -> Option<String> {
    response
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| line.get(..6).map_or(false, |head| head.eq_ignore_ascii_case("select")))
        .last()
        .map(|line| line.trim_end_matches(|c: char| c == ';' || c.is_whitespace()).to_string())
}
