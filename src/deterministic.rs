//! Deterministic Synthesizer
//!
//! Rule engine for the common, unambiguous question shapes: consumption,
//! totals, averages, raw ranges and latest readings. Anything it does not
//! recognize returns `None` and is left to the generative path.
//!
//! Branch order is fixed; the first branch whose conditions hold produces the
//! statement and no later branch is consulted.

use crate::facets::{Aggregation, DateLiteral, FacetExtractor, Facets, RegexFacetExtractor};
use crate::schema::{Metric, SchemaRegistry};
use crate::statement::Statement;
use chrono::{Local, NaiveDate};
use std::sync::Arc;
use tracing::debug;

pub struct DeterministicSynthesizer {
    schema: &'static SchemaRegistry,
    extractor: Arc<dyn FacetExtractor>,
}

impl DeterministicSynthesizer {
    pub fn new(schema: &'static SchemaRegistry) -> Self {
        Self::with_extractor(schema, Arc::new(RegexFacetExtractor::new()))
    }

    pub fn with_extractor(schema: &'static SchemaRegistry, extractor: Arc<dyn FacetExtractor>) -> Self {
        Self { schema, extractor }
    }

    /// Synthesize against today's local date.
    pub fn synthesize(&self, question: &str) -> Option<Statement> {
        self.synthesize_on(question, Local::now().date_naive())
    }

    /// Synthesize with an explicit processing date, used when a consumption
    /// question names no date.
    pub fn synthesize_on(&self, question: &str, today: NaiveDate) -> Option<Statement> {
        let facets = self.extractor.extract(question);
        debug!(?facets, "Extracted facets");
        self.from_facets(&facets, today).map(Statement::deterministic)
    }

    pub fn from_facets(&self, facets: &Facets, today: NaiveDate) -> Option<String> {
        if facets.aggregation == Aggregation::Consumption {
            // A named but impossible day must not fall back to the processing date.
            if facets.malformed_date {
                return None;
            }
            return Some(self.consumption(facets, today));
        }

        let metric = facets.metric?;

        match facets.aggregation {
            Aggregation::Sum => return Some(self.aggregate(facets, metric, "SUM", "total")),
            Aggregation::Avg => return Some(self.aggregate(facets, metric, "AVG", "avg")),
            _ => {}
        }

        if facets.relator.is_present() && !facets.malformed_date {
            if let Some((start, end)) = facets.date_pair() {
                return Some(self.raw_range(facets, metric, start, end));
            }
        }

        if facets.latest {
            return Some(self.latest(facets, metric));
        }

        None
    }

    fn machine_filter(&self, facets: &Facets, qualifier: Option<&str>) -> Option<String> {
        if facets.machines.is_empty() {
            return None;
        }
        let ids: Vec<String> = facets.machines.iter().map(|m| format!("'{}'", m)).collect();
        let column = match qualifier {
            Some(alias) => format!("{}.{}", alias, self.schema.machine_column),
            None => self.schema.machine_column.to_string(),
        };
        Some(format!("{} IN ({})", column, ids.join(", ")))
    }

    fn consumption(&self, facets: &Facets, today: NaiveDate) -> String {
        match facets.date_pair() {
            Some((start, end)) => self.consumption_range(facets, start, end),
            None => {
                let day = facets
                    .dates
                    .first()
                    .map(DateLiteral::day)
                    .unwrap_or_else(|| today.format("%Y-%m-%d").to_string());
                self.consumption_day(facets, &day)
            }
        }
    }

    // Today's peak counter minus the last counter value before the day began.
    // No earlier reading (first day of history) counts as zero.
    fn consumption_day(&self, facets: &Facets, day: &str) -> String {
        let SchemaRegistry { table, timestamp_column: ts, machine_column: mc, cumulative_column: kwh, .. } =
            *self.schema;

        let mut conditions = vec![format!("DATE(t1.{}) = '{}'", ts, day)];
        conditions.extend(self.machine_filter(facets, Some("t1")));

        format!(
            "SELECT t1.{mc}, (MAX(t1.{kwh}) - COALESCE((SELECT MAX({kwh}) FROM {table} \
             WHERE {mc} = t1.{mc} AND {ts} < '{day} 00:00:00'), 0)) AS power_consumption \
             FROM {table} t1{where_clause} GROUP BY t1.{mc}",
            where_clause = where_clause(&conditions),
        )
    }

    fn consumption_range(&self, facets: &Facets, start: &DateLiteral, end: &DateLiteral) -> String {
        let SchemaRegistry { table, timestamp_column: ts, machine_column: mc, cumulative_column: kwh, .. } =
            *self.schema;

        let mut conditions = vec![
            format!("{} >= '{} 00:00:00'", ts, start.day()),
            format!("{} <= '{} 23:59:59'", ts, end.day()),
        ];
        conditions.extend(self.machine_filter(facets, None));

        format!(
            "SELECT {mc}, MAX({kwh}) - MIN({kwh}) AS power_consumption FROM {table}{where_clause} GROUP BY {mc}",
            where_clause = where_clause(&conditions),
        )
    }

    fn aggregate(&self, facets: &Facets, metric: Metric, function: &str, alias_prefix: &str) -> String {
        let conditions: Vec<String> = self.machine_filter(facets, None).into_iter().collect();
        format!(
            "SELECT {mc}, {function}({col}) AS {alias_prefix}_{col} FROM {table}{where_clause} GROUP BY {mc}",
            mc = self.schema.machine_column,
            col = metric.column(),
            table = self.schema.table,
            where_clause = where_clause(&conditions),
        )
    }

    fn raw_range(&self, facets: &Facets, metric: Metric, start: &DateLiteral, end: &DateLiteral) -> String {
        let ts = self.schema.timestamp_column;
        let mut conditions = vec![
            format!("{} >= '{}'", ts, start.lower_bound()),
            format!("{} <= '{}'", ts, end.upper_bound()),
        ];
        conditions.extend(self.machine_filter(facets, None));

        format!(
            "SELECT {mc}, {col}, {ts} FROM {table}{where_clause} ORDER BY {ts} ASC",
            mc = self.schema.machine_column,
            col = metric.column(),
            table = self.schema.table,
            where_clause = where_clause(&conditions),
        )
    }

    fn latest(&self, facets: &Facets, metric: Metric) -> String {
        let conditions: Vec<String> = self.machine_filter(facets, None).into_iter().collect();
        format!(
            "SELECT DISTINCT ON ({mc}) {mc}, {col} AS latest_{col}, {ts} FROM {table}{where_clause} \
             ORDER BY {mc}, {ts} DESC",
            mc = self.schema.machine_column,
            col = metric.column(),
            ts = self.schema.timestamp_column,
            table = self.schema.table,
            where_clause = where_clause(&conditions),
        )
    }
}

fn where_clause(conditions: &[String]) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    }
}
