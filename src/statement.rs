use serde::Serialize;
use std::fmt;

/// Which synthesizer produced a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Deterministic,
    Generative,
}

/// A single candidate SELECT plus where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statement {
    pub sql: String,
    pub origin: Origin,
}

impl Statement {
    pub fn new(sql: impl Into<String>, origin: Origin) -> Self {
        Self { sql: sql.into(), origin }
    }

    pub fn deterministic(sql: impl Into<String>) -> Self {
        Self::new(sql, Origin::Deterministic)
    }

    pub fn generative(sql: impl Into<String>) -> Self {
        Self::new(sql, Origin::Generative)
    }

    pub fn with_sql(self, sql: String) -> Self {
        Self { sql, origin: self.origin }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}
