use async_trait::async_trait;
use chrono::NaiveDate;
use energy_query::db::{Row, StatementExecutor};
use energy_query::llm::TextCompletion;
use energy_query::{PipelineContext, QueryError, QueryPipeline, Result};
use serde_json::json;
use std::sync::{Arc, Mutex};

/// Answers each of the three prompt kinds from a fixed script.
struct ScriptedCompletion {
    intent: std::result::Result<String, String>,
    sql: std::result::Result<String, String>,
    answer: std::result::Result<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedCompletion {
    fn new(intent: &str) -> Self {
        Self {
            intent: Ok(intent.to_string()),
            sql: Err("statement synthesis was not expected".to_string()),
            answer: Ok("M1 used 12.5 kWh.".to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn with_sql(mut self, sql: &str) -> Self {
        self.sql = Ok(sql.to_string());
        self
    }

    fn with_answer_failure(mut self, message: &str) -> Self {
        self.answer = Err(message.to_string());
        self
    }

    fn with_intent_failure(mut self, message: &str) -> Self {
        self.intent = Err(message.to_string());
        self
    }

    fn prompt_count(&self, needle: &str) -> usize {
        self.prompts.lock().unwrap().iter().filter(|p| p.contains(needle)).count()
    }
}

#[async_trait]
impl TextCompletion for ScriptedCompletion {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let reply = if prompt.starts_with("Classify this message") {
            &self.intent
        } else if prompt.contains("STRICT RULES") {
            &self.sql
        } else {
            &self.answer
        };
        reply.clone().map_err(QueryError::Llm)
    }
}

struct RecordingExecutor {
    rows: std::result::Result<Vec<Row>, String>,
    executed: Mutex<Vec<String>>,
}

impl RecordingExecutor {
    fn returning(rows: Vec<Row>) -> Self {
        Self { rows: Ok(rows), executed: Mutex::new(Vec::new()) }
    }

    fn failing(message: &str) -> Self {
        Self { rows: Err(message.to_string()), executed: Mutex::new(Vec::new()) }
    }

    fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatementExecutor for RecordingExecutor {
    async fn fetch_rows(&self, sql: &str) -> Result<Vec<Row>> {
        self.executed.lock().unwrap().push(sql.to_string());
        self.rows.clone().map_err(QueryError::Database)
    }
}

fn row(value: serde_json::Value) -> Row {
    value.as_object().cloned().unwrap()
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 8, 10).unwrap()
}

struct Harness {
    completion: Arc<ScriptedCompletion>,
    executor: Arc<RecordingExecutor>,
    ctx: PipelineContext,
}

fn harness(completion: ScriptedCompletion, executor: RecordingExecutor) -> Harness {
    let completion = Arc::new(completion);
    let executor = Arc::new(executor);
    let ctx = PipelineContext::new(completion.clone(), executor.clone());
    Harness { completion, executor, ctx }
}

fn pipeline() -> QueryPipeline {
    QueryPipeline::new(energy_query::schema::SchemaRegistry::energy(), 2025, 3000)
}

#[tokio::test]
async fn test_greeting_short_circuits() {
    let h = harness(ScriptedCompletion::new("greeting"), RecordingExecutor::returning(vec![]));
    let response = pipeline().handle_on(&h.ctx, "hi", today()).await.unwrap();

    assert_eq!(response.sql, "");
    assert!(response.rows.is_empty());
    assert_eq!(response.answer, energy_query::intent::GREETING_REPLY);
    assert!(h.executor.executed().is_empty());
    assert_eq!(h.completion.prompts.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_help_and_other_are_canned() {
    for (label, reply) in [
        ("help", energy_query::intent::HELP_REPLY),
        ("other", energy_query::intent::OTHER_REPLY),
    ] {
        let h = harness(ScriptedCompletion::new(label), RecordingExecutor::returning(vec![]));
        let response = pipeline().handle_on(&h.ctx, "what can you do", today()).await.unwrap();
        assert_eq!(response.answer, reply);
        assert!(h.executor.executed().is_empty());
    }
}

#[tokio::test]
async fn test_empty_question_is_input_error_without_external_calls() {
    let h = harness(ScriptedCompletion::new("data_query"), RecordingExecutor::returning(vec![]));
    let err = pipeline().handle_on(&h.ctx, "   ", today()).await.unwrap_err();

    assert_eq!(err.category(), "input_error");
    assert!(h.completion.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_deterministic_path_skips_generation() {
    let rows = vec![row(json!({"machine_id": "M1", "power_consumption": 12.5}))];
    let h = harness(ScriptedCompletion::new("data_query"), RecordingExecutor::returning(rows.clone()));
    let response = pipeline()
        .handle_on(&h.ctx, "power consumption between 2025-08-01 and 2025-08-05 for M1", today())
        .await
        .unwrap();

    assert!(response.sql.contains("MAX(kwh) - MIN(kwh) AS power_consumption"));
    assert_eq!(h.executor.executed(), vec![response.sql.clone()]);
    assert_eq!(response.rows, rows);
    assert_eq!(response.answer, "M1 used 12.5 kWh.");
    assert_eq!(h.completion.prompt_count("STRICT RULES"), 0);
    assert_eq!(h.completion.prompt_count("SQL results: [{\"machine_id\":\"M1\""), 1);
}

#[tokio::test]
async fn test_generative_fallback_is_repaired_and_executed() {
    let completion = ScriptedCompletion::new("data_query").with_sql(
        "Sure, here it is:\nSELECT voltage, timestamp FROM energy_data ORDER BY voltage DESC LIMIT 1;",
    );
    let h = harness(completion, RecordingExecutor::returning(vec![]));
    let response = pipeline()
        .handle_on(&h.ctx, "which reading had the highest voltage ever", today())
        .await
        .unwrap();

    assert_eq!(
        response.sql,
        "SELECT voltage, timestamp, machine_id FROM energy_data ORDER BY voltage DESC LIMIT 1"
    );
    assert_eq!(h.executor.executed(), vec![response.sql.clone()]);
    assert_eq!(h.completion.prompt_count("STRICT RULES"), 1);
}

#[tokio::test]
async fn test_unsafe_generated_statement_is_rejected_before_execution() {
    let completion = ScriptedCompletion::new("data_query")
        .with_sql("SELECT * FROM energy_data; DROP TABLE energy_data");
    let h = harness(completion, RecordingExecutor::returning(vec![]));
    let err = pipeline()
        .handle_on(&h.ctx, "show everything then clean up", today())
        .await
        .unwrap_err();

    assert_eq!(err.category(), "safety_rejection");
    assert!(h.executor.executed().is_empty());
}

#[tokio::test]
async fn test_statement_for_other_table_is_rejected() {
    let completion = ScriptedCompletion::new("data_query").with_sql("SELECT * FROM pg_shadow");
    let h = harness(completion, RecordingExecutor::returning(vec![]));
    let err = pipeline().handle_on(&h.ctx, "list the users", today()).await.unwrap_err();

    assert!(matches!(err, QueryError::SafetyRejection { .. }));
    assert!(h.executor.executed().is_empty());
}

#[tokio::test]
async fn test_synthesis_without_select_aborts() {
    let completion = ScriptedCompletion::new("data_query").with_sql("I don't know.");
    let h = harness(completion, RecordingExecutor::returning(vec![]));
    let err = pipeline().handle_on(&h.ctx, "how is the plant", today()).await.unwrap_err();

    assert_eq!(err.category(), "synthesis_error");
    assert!(h.executor.executed().is_empty());
}

#[tokio::test]
async fn test_classification_failure_aborts() {
    let completion = ScriptedCompletion::new("data_query").with_intent_failure("timeout");
    let h = harness(completion, RecordingExecutor::returning(vec![]));
    let err = pipeline().handle_on(&h.ctx, "total voltage for M1", today()).await.unwrap_err();

    assert_eq!(err.category(), "classification_error");
    assert!(h.executor.executed().is_empty());
}

#[tokio::test]
async fn test_execution_failure_is_surfaced() {
    let h = harness(ScriptedCompletion::new("data_query"), RecordingExecutor::failing("relation does not exist"));
    let err = pipeline().handle_on(&h.ctx, "total voltage for M1", today()).await.unwrap_err();

    assert!(matches!(err, QueryError::Execution(msg) if msg.contains("relation does not exist")));
}

#[tokio::test]
async fn test_answer_failure_keeps_statement_and_rows() {
    let rows = vec![row(json!({"machine_id": "M1", "total_voltage": 4600.0}))];
    let completion = ScriptedCompletion::new("data_query").with_answer_failure("rate limited");
    let h = harness(completion, RecordingExecutor::returning(rows.clone()));
    let response = pipeline().handle_on(&h.ctx, "total voltage for M1", today()).await.unwrap();

    assert_eq!(
        response.sql,
        "SELECT machine_id, SUM(voltage) AS total_voltage FROM energy_data WHERE machine_id IN ('M1') GROUP BY machine_id"
    );
    assert_eq!(response.rows, rows);
    assert!(response.answer.starts_with("(Answer generation failed:"));
    assert!(response.answer.contains("rate limited"));
}

#[tokio::test]
async fn test_unrecognized_intent_falls_through_to_query() {
    let h = harness(ScriptedCompletion::new("a question about data"), RecordingExecutor::returning(vec![]));
    let response = pipeline().handle_on(&h.ctx, "latest voltage", today()).await.unwrap();

    assert!(response.sql.starts_with("SELECT DISTINCT ON (machine_id)"));
    assert_eq!(h.executor.executed().len(), 1);
}

#[tokio::test]
async fn test_response_serializes_with_ordered_columns() {
    let rows = vec![row(json!({"machine_id": "M2", "avg_voltage": 229.8}))];
    let h = harness(ScriptedCompletion::new("data_query"), RecordingExecutor::returning(rows));
    let response = pipeline().handle_on(&h.ctx, "average voltage for M2", today()).await.unwrap();

    let json = serde_json::to_string(&response).unwrap();
    assert!(json.starts_with("{\"sql\":\"SELECT machine_id, AVG(voltage)"));
    assert!(json.contains("\"rows\":[{\"machine_id\":\"M2\",\"avg_voltage\":229.8}]"));
}

#[tokio::test]
async fn test_impossible_consumption_date_goes_to_generation() {
    let completion = ScriptedCompletion::new("data_query").with_sql(
        "SELECT machine_id, MAX(kwh) - MIN(kwh) AS power_consumption FROM energy_data GROUP BY machine_id",
    );
    let h = harness(completion, RecordingExecutor::returning(vec![]));
    let response = pipeline()
        .handle_on(&h.ctx, "power consumption on 2025-02-30 for M1", today())
        .await
        .unwrap();

    assert_eq!(h.completion.prompt_count("STRICT RULES"), 1);
    assert!(!response.sql.contains("2025-08-10"));
}
