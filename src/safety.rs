//! Safety Validator
//!
//! Allow-list gate in front of execution. It is purely syntactic: a disallowed
//! token anywhere in the text rejects the statement, string literals included.

use crate::schema::SchemaRegistry;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

pub const FORBIDDEN_KEYWORDS: &[&str] = &[
    "drop", "delete", "insert", "update", "alter", "truncate", "create", "grant", "revoke",
];

lazy_static! {
    static ref FORBIDDEN_RE: Regex =
        Regex::new(&format!(r"(?i)\b({})\b", FORBIDDEN_KEYWORDS.join("|"))).unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RejectionReason {
    ForbiddenKeyword(String),
    StatementTerminator,
    Comment,
    NotASelect,
    MissingTable(String),
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::ForbiddenKeyword(k) => write!(f, "forbidden keyword '{}'", k),
            RejectionReason::StatementTerminator => f.write_str("statement terminator"),
            RejectionReason::Comment => f.write_str("comment token"),
            RejectionReason::NotASelect => f.write_str("not a SELECT statement"),
            RejectionReason::MissingTable(t) => write!(f, "table '{}' not referenced", t),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationVerdict {
    pub accepted: bool,
    pub statement: String,
    pub reason: Option<RejectionReason>,
}

impl ValidationVerdict {
    fn accept(statement: &str) -> Self {
        Self { accepted: true, statement: statement.to_string(), reason: None }
    }

    fn reject(statement: &str, reason: RejectionReason) -> Self {
        Self { accepted: false, statement: statement.to_string(), reason: Some(reason) }
    }
}

pub struct SafetyValidator {
    table: &'static str,
    table_re: Regex,
}

impl SafetyValidator {
    pub fn new(schema: &'static SchemaRegistry) -> Self {
        let table_re = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(schema.table)))
            .expect("escaped table name is a valid pattern");
        Self { table: schema.table, table_re }
    }

    pub fn validate(&self, statement: &str) -> ValidationVerdict {
        let verdict = self.check(statement);
        match &verdict.reason {
            None => info!("Statement passed safety checks"),
            Some(reason) => warn!(%reason, statement, "Statement rejected by safety checks"),
        }
        verdict
    }

    pub fn is_safe(&self, statement: &str) -> bool {
        self.check(statement).accepted
    }

    fn check(&self, statement: &str) -> ValidationVerdict {
        if let Some(m) = FORBIDDEN_RE.find(statement) {
            return ValidationVerdict::reject(
                statement,
                RejectionReason::ForbiddenKeyword(m.as_str().to_lowercase()),
            );
        }
        if statement.contains(';') {
            return ValidationVerdict::reject(statement, RejectionReason::StatementTerminator);
        }
        if statement.contains("--") || statement.contains("/*") {
            return ValidationVerdict::reject(statement, RejectionReason::Comment);
        }
        if !statement.trim().to_lowercase().starts_with("select") {
            return ValidationVerdict::reject(statement, RejectionReason::NotASelect);
        }
        if !self.table_re.is_match(statement) {
            return ValidationVerdict::reject(
                statement,
                RejectionReason::MissingTable(self.table.to_string()),
            );
        }
        ValidationVerdict::accept(statement)
    }
}
