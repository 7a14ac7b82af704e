//! Prompt construction for the three completion call sites: intent labeling,
//! statement synthesis and answer synthesis.

use crate::schema::SchemaRegistry;

/// A worked question/statement pair shown to the model. `{year}` and `{table}`
/// in either text are substituted when rendered.
#[derive(Debug, Clone, Copy)]
pub struct FewShotExample {
    pub question: &'static str,
    pub sql: &'static str,
}

impl FewShotExample {
    pub fn question(&self, year: i32) -> String {
        render(self.question, SchemaRegistry::energy().table, year)
    }

    pub fn sql(&self, year: i32) -> String {
        render(self.sql, SchemaRegistry::energy().table, year)
    }
}

fn render(template: &str, table: &str, year: i32) -> String {
    template
        .replace("{table}", table)
        .replace("{year}", &year.to_string())
}

pub const FEW_SHOT_EXAMPLES: &[FewShotExample] = &[
    FewShotExample {
        question: "What is the voltage on {year}-08-07 and {year}-07-29 for M1?",
        sql: "SELECT machine_id, timestamp, voltage FROM {table} WHERE machine_id = 'M1' \
              AND timestamp IN ('{year}-08-07 00:00:00','{year}-07-29 00:00:00')",
    },
    FewShotExample {
        question: "What is the voltage between {year}-08-01 and {year}-08-05 for M1 and M2?",
        sql: "SELECT machine_id, timestamp, voltage FROM {table} WHERE machine_id IN ('M1','M2') \
              AND timestamp >= '{year}-08-01 00:00:00' AND timestamp <= '{year}-08-05 23:59:59' \
              ORDER BY timestamp ASC",
    },
    FewShotExample {
        question: "What is the highest voltage between August 1 and August 5 for M1?",
        sql: "SELECT machine_id, MAX(voltage) AS highest_voltage FROM {table} WHERE machine_id = 'M1' \
              AND timestamp >= '{year}-08-01 00:00:00' AND timestamp <= '{year}-08-05 23:59:59' \
              GROUP BY machine_id",
    },
    FewShotExample {
        question: "Which machine had the highest power on Aug 3?",
        sql: "SELECT machine_id, power, timestamp FROM {table} WHERE timestamp >= '{year}-08-03 00:00:00' \
              AND timestamp < '{year}-08-04 00:00:00' ORDER BY power DESC LIMIT 1",
    },
    FewShotExample {
        question: "What is the difference in power between Aug 1 and Aug 3 for M2?",
        sql: "SELECT machine_id, MAX(power) - MIN(power) AS difference FROM {table} WHERE machine_id = 'M2' \
              AND timestamp IN ('{year}-08-01 00:00:00','{year}-08-03 00:00:00') GROUP BY machine_id",
    },
    FewShotExample {
        question: "What is the sum of load for M3 between July 29 and Aug 1?",
        sql: "SELECT machine_id, SUM(load) AS total_load FROM {table} WHERE machine_id = 'M3' \
              AND timestamp >= '{year}-07-29 00:00:00' AND timestamp <= '{year}-08-01 23:59:59' \
              GROUP BY machine_id",
    },
    FewShotExample {
        question: "What is the average power for M2 in August {year}?",
        sql: "SELECT machine_id, AVG(power) AS average_power FROM {table} WHERE machine_id = 'M2' \
              AND timestamp >= '{year}-08-01 00:00:00' AND timestamp < '{year}-09-01 00:00:00' \
              GROUP BY machine_id",
    },
    FewShotExample {
        question: "What is the power consumption on Aug 1 for M1?",
        sql: "SELECT t1.machine_id, (MAX(t1.kwh) - COALESCE((SELECT MAX(kwh) FROM {table} \
              WHERE machine_id = 'M1' AND timestamp < '{year}-08-01 00:00:00'), 0)) AS power_consumption \
              FROM {table} t1 WHERE t1.machine_id = 'M1' AND DATE(t1.timestamp) = '{year}-08-01' \
              GROUP BY t1.machine_id",
    },
    FewShotExample {
        question: "What is the power consumption between Aug 1 and Aug 5 for M1?",
        sql: "SELECT machine_id, MAX(kwh) - MIN(kwh) AS power_consumption FROM {table} WHERE machine_id = 'M1' \
              AND timestamp >= '{year}-08-01 00:00:00' AND timestamp <= '{year}-08-05 23:59:59' \
              GROUP BY machine_id",
    },
];

/// One-line instruction for intent labeling.
pub fn intent_prompt(question: &str) -> String {
    format!(
        "Classify this message: \"{}\"\nOne word only: greeting, help, data_query, or other.",
        question
    )
}

/// Builds the statement-synthesis instruction for the generative path.
#[derive(Debug, Clone)]
pub struct SqlPromptBuilder {
    schema: &'static SchemaRegistry,
    default_year: i32,
}

impl SqlPromptBuilder {
    pub fn new(schema: &'static SchemaRegistry, default_year: i32) -> Self {
        Self { schema, default_year }
    }

    pub fn build(&self, question: &str) -> String {
        format!(
            "{}\n{}\n\n===============================\nTASK\n===============================\n\
             Now, given the user's question, generate exactly one correct SQL SELECT query following all rules above.\n\
             User question: {}\nSQL:",
            self.rules(),
            self.examples(),
            question
        )
    }

    fn rules(&self) -> String {
        let table = self.schema.table;
        let columns = self.schema.columns.join(", ");
        let year = self.default_year;
        let metric_map = self
            .schema
            .metrics
            .iter()
            .map(|m| {
                let words: Vec<String> = m.synonyms().iter().map(|s| format!("\"{}\"", s)).collect();
                format!("     - {} -> `{}`", words.join(" / "), m.column())
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"You are an expert SQL generator for PostgreSQL.
Your job: Convert the user's question into ONE safe SQL SELECT query for the table `{table}` with columns: {columns}.

===============================
STRICT RULES
===============================

1. Output
   - Output only one SQL SELECT statement on a single line (no explanation, no markdown, no semicolon).
   - Never invent columns or tables.
   - Only use `{table}` and its listed columns.
   - Column names must be lowercase exactly as in schema.

2. Date & Time Handling
   - Parse natural language dates (e.g., "August 2" -> "{year}-08-02 00:00:00") using the year in the question, or assume {year} if none is given.
   - Month and day names are case-insensitive (e.g., "Aug", "august").
   - Use `timestamp >=` and `timestamp <` for whole-period ranges such as a month or a day.
   - For exact days joined by "and", use `timestamp IN ('date1','date2')`.

3. "AND" vs "BETWEEN"
   - "and" between two dates or times -> `timestamp IN ('date1','date2')`.
   - "between" -> `timestamp >= date1 AND timestamp <= date2 ORDER BY timestamp ASC`, with date2 at 23:59:59 when no time is given.
   - Case-insensitive.

4. Machine Filters
   - Machine IDs have the form 'M<number>' (e.g., 'M1', 'M2', 'M3').
   - Normalize: "machine 1" -> 'M1', "m1" -> 'M1'.
   - Multiple machines -> `machine_id IN (...)`.
   - No machine mentioned -> all machines.

5. Metric Handling (case-insensitive)
{metric_map}

6. Aggregation Rules
   - Aggregate only if requested or implied:
     - SUM -> total, sum
     - AVG -> average, avg, mean
     - MIN -> min, minimum, lowest, smallest
     - MAX -> max, maximum, highest, largest
     - DIFFERENCE -> `MAX(column) - MIN(column) AS difference`
   - Without aggregation return raw rows with `machine_id`, `timestamp` and the requested metric(s).
   - When aggregating, put every non-aggregated column in GROUP BY.

7. Ordering & Limits
   - Use ORDER BY when results should be sorted by a metric or by timestamp.
   - Use LIMIT only for "first", "latest", "top", "which machine had the highest/lowest" requests.
   - A single top row must include `machine_id`.

8. Restrictions
   - Read-only: never modify data or schema.
   - Never guess data.
   - Only return the columns needed to answer the question.

9. STRICT Consumption Rule
   - "power consumption", "energy consumption", "units consumed", "kwh used" -> ALWAYS calculate from `kwh`.
   - Never use the `power` column for consumption and never use SUM(power).
   - Single day: MAX(kwh on that day) - MAX(kwh before that day), using COALESCE(..., 0) when there is no earlier reading.
   - Date range: MAX(kwh) - MIN(kwh).
   - Subqueries are allowed only to fetch the previous day's reading.

10. Power vs. Consumption
   - "power" -> the `power` column (instantaneous values).
   - "power consumption" -> the `kwh` calculation above.
   - Never confuse the two.
"#
        )
    }

    fn examples(&self) -> String {
        let rendered: Vec<String> = FEW_SHOT_EXAMPLES
            .iter()
            .map(|e| format!("User: {}\nSQL: {}", e.question(self.default_year), e.sql(self.default_year)))
            .collect();
        format!(
            "===============================\nFEW-SHOT EXAMPLES\n===============================\n\n{}",
            rendered.join("\n\n")
        )
    }
}

/// Instruction for summarizing result rows.
pub fn answer_prompt(question: &str, rows_preview: &str) -> String {
    format!(
        "You are an assistant that, given the user's question and the SQL results, produces a concise answer.\n\
         Rules:\n\
         - Base the answer ONLY on the returned rows. Never invent values.\n\
         - Mention machine_id if present.\n\
         - If the rows are empty, say that no data was found.\n\
         User question: {}\nSQL results: {}\nAnswer:",
        question, rows_preview
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_prompt_embeds_schema_rules_and_question() {
        let prompt = SqlPromptBuilder::new(SchemaRegistry::energy(), 2025).build("average load for M3");
        assert!(prompt.contains("energy_data"));
        assert!(prompt.contains("id, timestamp, voltage, current, power, power_factor, load, kwh, machine_id"));
        assert!(prompt.contains("assume 2025"));
        assert!(prompt.contains("Never use the `power` column for consumption"));
        assert!(prompt.contains("\"power factor\" / \"power_factor\" / \"pf\" -> `power_factor`"));
        assert!(prompt.trim_end().ends_with("User question: average load for M3\nSQL:"));
    }

    #[test]
    fn test_examples_follow_default_year() {
        let prompt = SqlPromptBuilder::new(SchemaRegistry::energy(), 2026).build("q");
        assert!(prompt.contains("'2026-08-01 00:00:00'"));
        assert!(!prompt.contains("{year}"));
        assert!(!prompt.contains("{table}"));
    }

    #[test]
    fn test_examples_have_no_terminator() {
        for example in FEW_SHOT_EXAMPLES {
            assert!(!example.sql(2025).contains(';'));
        }
    }

    #[test]
    fn test_intent_prompt_lists_labels() {
        let prompt = intent_prompt("hello there");
        assert!(prompt.contains("\"hello there\""));
        assert!(prompt.contains("greeting, help, data_query, or other"));
    }

    #[test]
    fn test_answer_prompt_embeds_rows() {
        let prompt = answer_prompt("latest voltage", "[{\"machine_id\":\"M1\"}]");
        assert!(prompt.contains("SQL results: [{\"machine_id\":\"M1\"}]"));
        assert!(prompt.ends_with("Answer:"));
    }
}
