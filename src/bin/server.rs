//! HTTP server for energy-data questions
//! Simple HTTP server using tokio and basic HTTP handling

use clap::Parser;
use energy_query::config::Config;
use energy_query::db::{init_pool, PgStatementExecutor};
use energy_query::llm::LlmClient;
use energy_query::{PipelineContext, QueryError, QueryPipeline, QueryRequest};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout, Duration};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const MAX_REQUEST_BYTES: usize = 1_000_000;

#[derive(Parser)]
#[command(name = "server")]
#[command(about = "HTTP API for energy-data questions")]
struct Args {
    /// Address to listen on (or set LISTEN_ADDR env var)
    #[arg(long)]
    listen: Option<String>,
}

struct AppState {
    pipeline: QueryPipeline,
    ctx: PipelineContext,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = Config::from_env()?;
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }

    let pool = init_pool(config.require_database_url()?, config.db_max_connections).await?;
    info!("Database pool ready");

    let llm = Arc::new(LlmClient::new(&config.llm)?);
    info!(model = llm.model(), "LLM client ready");

    let state = Arc::new(AppState {
        pipeline: QueryPipeline::from_config(&config),
        ctx: PipelineContext::new(llm, Arc::new(PgStatementExecutor::new(pool.clone()))),
    });

    let listener = TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Server listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, addr) = accepted?;
                info!(%addr, "New connection");
                tokio::spawn(handle_connection(stream, state.clone()));
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    pool.close().await;
    Ok(())
}

async fn handle_connection(mut stream: TcpStream, state: Arc<AppState>) {
    let mut buffer = Vec::new();
    let mut temp_buf = [0; 8192];

    // Read request with timeout to prevent hanging
    let read_result = timeout(Duration::from_secs(5), async {
        loop {
            let n = stream.read(&mut temp_buf).await?;
            if n == 0 {
                break;
            }
            buffer.extend_from_slice(&temp_buf[..n]);
            if request_complete(&buffer) || buffer.len() > MAX_REQUEST_BYTES {
                break;
            }
        }
        Ok::<(), std::io::Error>(())
    })
    .await;

    match read_result {
        Err(_) => {
            warn!("Request read timeout");
            return;
        }
        Ok(Err(e)) => {
            error!(error = %e, "Failed to read from stream");
            return;
        }
        Ok(Ok(())) => {}
    }

    if buffer.is_empty() {
        return;
    }

    let request = String::from_utf8_lossy(&buffer);
    let response = handle_request(&request, &state).await;
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        error!(error = %e, "Failed to write response");
    }
}

/// Headers received and, when a Content-Length is given, the whole body too.
fn request_complete(buffer: &[u8]) -> bool {
    let Some(headers_end) = buffer.windows(4).position(|w| w == b"\r\n\r\n") else {
        return false;
    };
    let headers = String::from_utf8_lossy(&buffer[..headers_end]);
    match extract_content_length(&headers) {
        Some(len) => buffer.len() >= headers_end + 4 + len,
        None => true,
    }
}

fn extract_content_length(headers: &str) -> Option<usize> {
    headers.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        if key.trim().eq_ignore_ascii_case("content-length") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}

async fn handle_request(request: &str, state: &AppState) -> String {
    let request_line = request.lines().next().unwrap_or_default();
    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() < 2 {
        return create_response(400, "Bad Request", &error_body("input_error", "Malformed request line"));
    }

    let method = parts[0];
    let path = parts[1].split('?').next().unwrap_or("/");
    let path = match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };

    match (method, path) {
        ("GET", "/health") => create_response(200, "OK", r#"{"status":"ok","service":"energy-query"}"#),
        ("POST", "/query") => {
            let body = request.split_once("\r\n\r\n").map(|(_, b)| b).unwrap_or("");
            let req: QueryRequest = match serde_json::from_str(body.trim()) {
                Ok(req) => req,
                Err(e) => {
                    return create_response(
                        400,
                        "Bad Request",
                        &error_body("input_error", &format!("Invalid request body: {}", e)),
                    )
                }
            };

            match state.pipeline.handle(&state.ctx, &req.question).await {
                Ok(response) => match serde_json::to_string(&response) {
                    Ok(json) => create_response(200, "OK", &json),
                    Err(e) => create_response(
                        500,
                        "Internal Server Error",
                        &error_body("json_error", &e.to_string()),
                    ),
                },
                Err(e) => error_response(&e),
            }
        }
        _ => create_response(404, "Not Found", &error_body("not_found", "Unknown route")),
    }
}

fn error_response(err: &QueryError) -> String {
    warn!(category = err.category(), error = %err, "Request failed");
    let body = error_body(err.category(), &err.to_string());
    if err.is_client_error() {
        create_response(400, "Bad Request", &body)
    } else {
        create_response(500, "Internal Server Error", &body)
    }
}

fn error_body(category: &str, message: &str) -> String {
    serde_json::json!({"error": {"category": category, "message": message}}).to_string()
}

fn create_response(status: u16, status_text: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Type: application/json\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        status,
        status_text,
        body.len(),
        body
    )
}
