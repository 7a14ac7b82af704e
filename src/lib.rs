pub mod answer;
pub mod config;
pub mod db;
pub mod deterministic;
pub mod error;
pub mod facets;
pub mod generative;
pub mod intent;
pub mod llm;
pub mod pipeline;
pub mod prompts;
pub mod repair;
pub mod safety;
pub mod schema;
pub mod statement;

pub use error::{QueryError, Result};
pub use pipeline::{PipelineContext, QueryPipeline, QueryRequest, QueryResponse};
