//! Question → statement → rows → answer.
//!
//! `Received → Classified → {CannedReply | SqlPending} → Synthesized →
//! Repaired → Validated → Executed → Answered`. Every stage before answering
//! fails fast; answer synthesis degrades to a placeholder instead.

use crate::answer::AnswerSynthesizer;
use crate::config::{Config, DEFAULT_PREVIEW_CHARS};
use crate::db::{Row, StatementExecutor};
use crate::deterministic::DeterministicSynthesizer;
use crate::error::{QueryError, Result};
use crate::generative::GenerativeSynthesizer;
use crate::intent::IntentClassifier;
use crate::llm::TextCompletion;
use crate::repair::StatementRepair;
use crate::safety::SafetyValidator;
use crate::schema::SchemaRegistry;
use crate::statement::Statement;
use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, info_span, Instrument};

#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub question: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub sql: String,
    pub rows: Vec<Row>,
    pub answer: String,
}

impl QueryResponse {
    fn canned(answer: &str) -> Self {
        Self { sql: String::new(), rows: Vec::new(), answer: answer.to_string() }
    }
}

/// External collaborators shared by every in-flight request.
#[derive(Clone)]
pub struct PipelineContext {
    pub completion: Arc<dyn TextCompletion>,
    pub executor: Arc<dyn StatementExecutor>,
}

impl PipelineContext {
    pub fn new(completion: Arc<dyn TextCompletion>, executor: Arc<dyn StatementExecutor>) -> Self {
        Self { completion, executor }
    }
}

pub struct QueryPipeline {
    deterministic: DeterministicSynthesizer,
    generative: GenerativeSynthesizer,
    repair: StatementRepair,
    validator: SafetyValidator,
    answerer: AnswerSynthesizer,
}

impl QueryPipeline {
    pub fn new(schema: &'static SchemaRegistry, default_year: i32, preview_chars: usize) -> Self {
        Self {
            deterministic: DeterministicSynthesizer::new(schema),
            generative: GenerativeSynthesizer::new(schema, default_year),
            repair: StatementRepair::new(schema),
            validator: SafetyValidator::new(schema),
            answerer: AnswerSynthesizer::new(preview_chars),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(SchemaRegistry::energy(), config.default_year, config.answer_preview_chars)
    }

    /// Full request: classify, synthesize, validate, execute, answer.
    pub async fn handle(&self, ctx: &PipelineContext, question: &str) -> Result<QueryResponse> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let span = info_span!("query", %request_id);
        self.handle_on(ctx, question, Local::now().date_naive()).instrument(span).await
    }

    pub async fn handle_on(&self, ctx: &PipelineContext, question: &str, today: NaiveDate) -> Result<QueryResponse> {
        let question = question.trim();
        if question.is_empty() {
            return Err(QueryError::Input("Empty question".to_string()));
        }
        info!(question, "Received question");

        let intent = IntentClassifier::classify(ctx.completion.as_ref(), question).await?;
        if let Some(reply) = intent.canned_reply() {
            info!(intent = ?intent, "Answering with canned reply");
            return Ok(QueryResponse::canned(reply));
        }

        let statement = self.statement_for(ctx.completion.as_ref(), question, today).await?;

        let rows = ctx.executor.fetch_rows(&statement.sql).await.map_err(|e| match e {
            QueryError::Execution(msg) | QueryError::Database(msg) => QueryError::Execution(msg),
            other => QueryError::Execution(other.to_string()),
        })?;

        let answer = self.answerer.answer(ctx.completion.as_ref(), question, &rows).await;
        info!(rows = rows.len(), origin = ?statement.origin, "Answered question");

        Ok(QueryResponse { sql: statement.sql, rows, answer })
    }

    /// Synthesis, repair and validation without execution.
    pub async fn statement_for(
        &self,
        completion: &dyn TextCompletion,
        question: &str,
        today: NaiveDate,
    ) -> Result<Statement> {
        let synthesized = match self.deterministic.synthesize_on(question, today) {
            Some(statement) => {
                info!(sql = %statement.sql, "Deterministic statement");
                statement
            }
            None => {
                info!("No deterministic match, falling back to generative synthesis");
                self.generative.synthesize(completion, question).await?
            }
        };

        let repaired = self.repair.repair(&synthesized.sql);
        let statement = synthesized.with_sql(repaired);

        let verdict = self.validator.validate(&statement.sql);
        if let Some(reason) = verdict.reason {
            return Err(QueryError::SafetyRejection { statement: verdict.statement, reason: reason.to_string() });
        }
        Ok(statement)
    }
}

impl Default for QueryPipeline {
    fn default() -> Self {
        Self::new(SchemaRegistry::energy(), Local::now().year(), DEFAULT_PREVIEW_CHARS)
    }
}
