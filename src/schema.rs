//! Schema Registry
//!
//! Static description of the single queryable relation. Everything above this
//! module reads table and column names from here instead of spelling them out.

use serde::Serialize;
use std::fmt;

/// A telemetry metric that maps onto one numeric column of the relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Voltage,
    Current,
    Power,
    PowerFactor,
    Load,
    Kwh,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::Voltage,
        Metric::Current,
        Metric::Power,
        Metric::PowerFactor,
        Metric::Load,
        Metric::Kwh,
    ];

    /// Column holding this metric.
    pub fn column(&self) -> &'static str {
        match self {
            Metric::Voltage => "voltage",
            Metric::Current => "current",
            Metric::Power => "power",
            Metric::PowerFactor => "power_factor",
            Metric::Load => "load",
            Metric::Kwh => "kwh",
        }
    }

    /// Words a user may type for this metric, lower-case.
    pub fn synonyms(&self) -> &'static [&'static str] {
        match self {
            Metric::Voltage => &["voltage"],
            Metric::Current => &["current"],
            Metric::Power => &["power"],
            Metric::PowerFactor => &["power factor", "power_factor", "pf"],
            Metric::Load => &["load"],
            Metric::Kwh => &["kwh"],
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRegistry {
    pub table: &'static str,
    pub columns: &'static [&'static str],
    pub metrics: &'static [Metric],
    pub timestamp_column: &'static str,
    pub machine_column: &'static str,
    /// Monotonically increasing energy counter; consumption is always its delta.
    pub cumulative_column: &'static str,
}

pub static ENERGY_SCHEMA: SchemaRegistry = SchemaRegistry {
    table: "energy_data",
    columns: &[
        "id",
        "timestamp",
        "voltage",
        "current",
        "power",
        "power_factor",
        "load",
        "kwh",
        "machine_id",
    ],
    metrics: &Metric::ALL,
    timestamp_column: "timestamp",
    machine_column: "machine_id",
    cumulative_column: "kwh",
};

impl SchemaRegistry {
    /// The registry for the energy telemetry table.
    pub fn energy() -> &'static SchemaRegistry {
        &ENERGY_SCHEMA
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.eq_ignore_ascii_case(name))
    }

    /// `energy_data(id, timestamp, ...)` rendering used in prompts.
    pub fn describe(&self) -> String {
        format!("{}({})", self.table, self.columns.join(", "))
    }
}
