//! Facet extraction
//!
//! Pulls the handful of facts the deterministic synthesizer needs out of a
//! question: machine ids, date literals, a metric, an aggregation verb and the
//! range relator. Extraction is a pure function of the text.

use crate::schema::Metric;
use chrono::{NaiveDate, NaiveTime};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::fmt;

/// Phrases that always mean "delta of the cumulative energy counter".
pub const CONSUMPTION_PHRASES: &[&str] = &[
    "power consumption",
    "energy consumption",
    "units consumed",
    "kwh used",
    "kwh consumed",
    "energy used",
];

lazy_static! {
    static ref MACHINE_RE: Regex = Regex::new(r"(?i)\b(?:m|machine\s*)(\d+)\b").unwrap();
    static ref DATE_RE: Regex =
        Regex::new(r"\b(\d{4}-\d{2}-\d{2})(?:[ T](\d{2}:\d{2}:\d{2}))?\b").unwrap();
    static ref METRIC_RE: Regex = Regex::new(&metric_pattern()).unwrap();
    static ref SUM_RE: Regex = Regex::new(r"(?i)\b(total|sum)\b").unwrap();
    static ref AVG_RE: Regex = Regex::new(r"(?i)\b(average|avg|mean)\b").unwrap();
    static ref MIN_RE: Regex = Regex::new(r"(?i)\b(min|minimum|lowest|smallest)\b").unwrap();
    static ref MAX_RE: Regex = Regex::new(r"(?i)\b(max|maximum|highest|largest|peak)\b").unwrap();
    static ref DIFF_RE: Regex = Regex::new(r"(?i)\b(difference|diff)\b").unwrap();
    static ref LATEST_RE: Regex = Regex::new(r"(?i)\b(latest|most recent)\b").unwrap();
    static ref BETWEEN_RE: Regex = Regex::new(r"(?i)\bbetween\b").unwrap();
    static ref AND_RE: Regex = Regex::new(r"(?i)\band\b").unwrap();
}

// Longest synonyms first so "power factor" wins over "power" at the same offset.
fn metric_pattern() -> String {
    let mut synonyms: Vec<&str> = Metric::ALL.iter().flat_map(|m| m.synonyms().iter().copied()).collect();
    synonyms.sort_by(|a, b| b.len().cmp(&a.len()));
    let alternation: Vec<String> = synonyms.iter().map(|s| regex::escape(s)).collect();
    format!(r"(?i)\b({})\b", alternation.join("|"))
}

fn metric_for(word: &str) -> Option<Metric> {
    let word = word.to_lowercase();
    Metric::ALL.iter().copied().find(|m| m.synonyms().contains(&word.as_str()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Consumption,
    Sum,
    Avg,
    Min,
    Max,
    Difference,
    Latest,
    None,
}

/// How two dates in a question relate to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeRelator {
    /// "between A and B": inclusive range.
    Between,
    /// "A and B": enumeration of points.
    Enumeration,
    None,
}

impl RangeRelator {
    pub fn is_present(&self) -> bool {
        !matches!(self, RangeRelator::None)
    }
}

/// A `YYYY-MM-DD` literal, optionally with a `HH:MM:SS` time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateLiteral {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
}

impl DateLiteral {
    pub fn day(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    /// Inclusive lower bound: the literal itself, or the start of its day.
    pub fn lower_bound(&self) -> String {
        match self.time {
            Some(_) => self.to_string(),
            None => format!("{} 00:00:00", self.day()),
        }
    }

    /// Inclusive upper bound: the literal itself, or the last second of its day.
    pub fn upper_bound(&self) -> String {
        match self.time {
            Some(_) => self.to_string(),
            None => format!("{} 23:59:59", self.day()),
        }
    }
}

impl fmt::Display for DateLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.time {
            Some(time) => write!(f, "{} {}", self.day(), time.format("%H:%M:%S")),
            None => f.write_str(&self.day()),
        }
    }
}

/// Everything extracted from one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Facets {
    pub text: String,
    pub machines: Vec<String>,
    pub dates: Vec<DateLiteral>,
    pub metric: Option<Metric>,
    pub aggregation: Aggregation,
    pub relator: RangeRelator,
    /// The word "latest" (or "most recent") appears, whatever the verb.
    pub latest: bool,
    /// Some `YYYY-MM-DD` literal does not name a real calendar date.
    pub malformed_date: bool,
}

impl Facets {
    /// First two dates in textual order, if there are at least two.
    pub fn date_pair(&self) -> Option<(&DateLiteral, &DateLiteral)> {
        match self.dates.as_slice() {
            [first, second, ..] => Some((first, second)),
            _ => None,
        }
    }
}

/// Seam between the synthesis branches and how facts are found in text.
pub trait FacetExtractor: Send + Sync {
    fn extract(&self, question: &str) -> Facets;
}

/// Regex-based extraction over the fixed metric and machine vocabulary.
#[derive(Debug, Default, Clone)]
pub struct RegexFacetExtractor;

impl RegexFacetExtractor {
    pub fn new() -> Self {
        Self
    }

    fn machines(text: &str) -> Vec<String> {
        let mut machines: Vec<String> = Vec::new();
        for caps in MACHINE_RE.captures_iter(text) {
            let id = format!("M{}", &caps[1]);
            if !machines.contains(&id) {
                machines.push(id);
            }
        }
        machines
    }

    /// Valid literals in textual order, and whether any date part was invalid.
    /// An unparseable time leaves the date as a whole-day literal.
    fn dates(text: &str) -> (Vec<DateLiteral>, bool) {
        let mut dates = Vec::new();
        let mut malformed = false;
        for caps in DATE_RE.captures_iter(text) {
            match NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d") {
                Ok(date) => {
                    let time = caps.get(2).and_then(|t| NaiveTime::parse_from_str(t.as_str(), "%H:%M:%S").ok());
                    dates.push(DateLiteral { date, time });
                }
                Err(_) => malformed = true,
            }
        }
        (dates, malformed)
    }

    fn aggregation(lower: &str) -> Aggregation {
        if CONSUMPTION_PHRASES.iter().any(|p| lower.contains(p)) {
            Aggregation::Consumption
        } else if SUM_RE.is_match(lower) {
            Aggregation::Sum
        } else if AVG_RE.is_match(lower) {
            Aggregation::Avg
        } else if MIN_RE.is_match(lower) {
            Aggregation::Min
        } else if MAX_RE.is_match(lower) {
            Aggregation::Max
        } else if DIFF_RE.is_match(lower) {
            Aggregation::Difference
        } else if LATEST_RE.is_match(lower) {
            Aggregation::Latest
        } else {
            Aggregation::None
        }
    }

    fn relator(lower: &str) -> RangeRelator {
        if BETWEEN_RE.is_match(lower) {
            RangeRelator::Between
        } else if AND_RE.is_match(lower) {
            RangeRelator::Enumeration
        } else {
            RangeRelator::None
        }
    }
}

impl FacetExtractor for RegexFacetExtractor {
    fn extract(&self, question: &str) -> Facets {
        let lower = question.to_lowercase();
        let aggregation = Self::aggregation(&lower);
        let metric = if aggregation == Aggregation::Consumption {
            Some(Metric::Kwh)
        } else {
            METRIC_RE.find(&lower).and_then(|m| metric_for(m.as_str()))
        };

        let (dates, malformed_date) = Self::dates(question);

        Facets {
            text: question.to_string(),
            machines: Self::machines(question),
            dates,
            metric,
            aggregation,
            relator: Self::relator(&lower),
            latest: LATEST_RE.is_match(&lower),
            malformed_date,
        }
    }
}
