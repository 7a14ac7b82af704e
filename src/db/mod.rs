//! Database access for statement execution
//!
//! The pipeline only sees the `StatementExecutor` trait; the PostgreSQL
//! implementation runs validated statements over a shared `sqlx` pool.

pub mod connection;
pub mod executor;

pub use connection::{init_pool, DbPool};
pub use executor::{PgStatementExecutor, Row, StatementExecutor};
