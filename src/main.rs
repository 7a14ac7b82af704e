use anyhow::Result;
use chrono::Local;
use clap::Parser;
use energy_query::config::Config;
use energy_query::db::{init_pool, PgStatementExecutor};
use energy_query::llm::LlmClient;
use energy_query::{PipelineContext, QueryPipeline};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "energy-query")]
#[command(about = "Answer questions about machine energy telemetry")]
struct Args {
    /// The question in natural language
    question: String,

    /// Print the validated SQL without executing it
    #[arg(long)]
    sql_only: bool,

    /// LLM model (or set LLM_MODEL env var)
    #[arg(long)]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut config = Config::from_env()?;
    if let Some(model) = args.model {
        config.llm.model = model;
    }

    let llm = Arc::new(LlmClient::new(&config.llm)?);
    info!(model = llm.model(), "LLM client ready");
    let pipeline = QueryPipeline::from_config(&config);

    if args.sql_only {
        let statement = pipeline
            .statement_for(llm.as_ref(), &args.question, Local::now().date_naive())
            .await?;
        println!("{}", statement.sql);
        return Ok(());
    }

    let pool = init_pool(config.require_database_url()?, config.db_max_connections).await?;
    let ctx = PipelineContext::new(llm, Arc::new(PgStatementExecutor::new(pool.clone())));

    let response = pipeline.handle(&ctx, &args.question).await;
    pool.close().await;

    println!("{}", serde_json::to_string_pretty(&response?)?);
    Ok(())
}
