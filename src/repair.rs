//! Statement Repair
//!
//! A single "top row" without the machine column cannot be attributed, so a
//! statement that orders and keeps only one row gets `machine_id` appended to
//! its column list.

use crate::schema::SchemaRegistry;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::info;

lazy_static! {
    static ref ORDER_BY_RE: Regex = Regex::new(r"(?i)\border\s+by\b").unwrap();
    static ref LIMIT_ONE_RE: Regex = Regex::new(r"(?i)\blimit\s+1\b").unwrap();
}

pub struct StatementRepair {
    machine_column: &'static str,
    projection_re: Regex,
    machine_re: Regex,
}

impl StatementRepair {
    pub fn new(schema: &'static SchemaRegistry) -> Self {
        // Leading SELECT list up to the first FROM of the registered table.
        let projection_re = Regex::new(&format!(
            r"(?is)^(\s*select\s+)(.*?)(\s+from\s+{}\b)",
            regex::escape(schema.table)
        ))
        .expect("escaped table name is a valid pattern");
        let machine_re = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(schema.machine_column)))
            .expect("escaped column name is a valid pattern");

        Self { machine_column: schema.machine_column, projection_re, machine_re }
    }

    pub fn repair(&self, sql: &str) -> String {
        if !ORDER_BY_RE.is_match(sql) || !LIMIT_ONE_RE.is_match(sql) {
            return sql.to_string();
        }

        let Some(caps) = self.projection_re.captures(sql) else {
            return sql.to_string();
        };

        let columns = caps[2].trim();
        if is_wildcard(columns) || self.machine_re.is_match(columns) {
            return sql.to_string();
        }
        // The FROM matched belongs to a subquery inside the select list.
        if !parens_balanced(columns) {
            return sql.to_string();
        }

        let whole = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
        let repaired = format!(
            "{}{}{}, {}{}{}",
            &sql[..whole.start],
            &caps[1],
            columns,
            self.machine_column,
            &caps[3],
            &sql[whole.end..]
        );
        info!(original = sql, repaired = %repaired, "Appended machine column to top-1 statement");
        repaired
    }
}

fn is_wildcard(columns: &str) -> bool {
    columns == "*" || columns.ends_with(".*")
}

fn parens_balanced(columns: &str) -> bool {
    let mut depth: i32 = 0;
    for c in columns.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            _ => {}
        }
        if depth < 0 {
            return false;
        }
    }
    depth == 0
}
