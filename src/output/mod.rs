// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Output formatters for normalized search records

use colored::Colorize;
use radiobridge::search::{FormattedDate, Record};
use serde_json::Value;
use std::time::Duration;
use tabled::builder::Builder;
use tabled::settings::Style;

pub trait OutputFormatter {
    fn format(&self, records: &[Record], duration: Duration) -> String;
}

/// Table formatter (default, colorized)
pub struct TableFormatter {
    colorized: bool,
}

impl TableFormatter {
    pub fn new(colorized: bool) -> Self {
        Self { colorized }
    }
}

impl OutputFormatter for TableFormatter {
    fn format(&self, records: &[Record], duration: Duration) -> String {
        let summary = format!("{} hit(s) in {:?}", records.len(), duration);
        let summary = if !self.colorized {
            summary
        } else if records.is_empty() {
            summary.yellow().to_string()
        } else {
            summary.green().to_string()
        };

        if records.is_empty() {
            return summary;
        }

        let mut builder = Builder::default();
        builder.push_record(["_id", "label", "start", "stop", "presenters"]);
        for record in records {
            builder.push_record([
                record.id.clone(),
                label(record),
                when(record.start.as_ref()),
                when(record.stop.as_ref()),
                record.presenters.as_ref().map(|p| p.join(", ")).unwrap_or_default(),
            ]);
        }

        let mut table = builder.build();
        table.with(Style::rounded());
        format!("{}\n{}", table, summary)
    }
}

/// JSON formatter
pub struct JsonFormatter;

impl JsonFormatter {
    pub fn new() -> Self {
        Self
    }
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, records: &[Record], _duration: Duration) -> String {
        serde_json::to_string_pretty(records).unwrap_or_default()
    }
}

/// Most descriptive text field of a record
fn label(record: &Record) -> String {
    ["title", "name", "short_name"]
        .iter()
        .find_map(|field| record.get(field).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}

fn when(date: Option<&FormattedDate>) -> String {
    date.map(|d| format!("{} {} ({})", d.full_date, d.time, d.day))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn record() -> Record {
        let mut fields = Map::new();
        fields.insert("title".to_string(), json!("Ochtendshow"));
        Record {
            id: "7".to_string(),
            fields,
            field_values: None,
            presenters: Some(vec!["Eva".to_string(), "Jan".to_string()]),
            start: Some(FormattedDate {
                full_date: "01/01/2024".to_string(),
                time: "11:00".to_string(),
                day: "maandag".to_string(),
            }),
            stop: None,
        }
    }

    #[test]
    fn test_table_contains_record_columns() {
        let output = TableFormatter::new(false).format(&[record()], Duration::from_millis(12));
        assert!(output.contains("Ochtendshow"));
        assert!(output.contains("01/01/2024 11:00 (maandag)"));
        assert!(output.contains("Eva, Jan"));
        assert!(output.contains("1 hit(s)"));
    }

    #[test]
    fn test_table_without_records() {
        let output = TableFormatter::new(false).format(&[], Duration::ZERO);
        assert!(output.starts_with("0 hit(s)"));
    }

    #[test]
    fn test_json_output() {
        let output = JsonFormatter::new().format(&[record()], Duration::ZERO);
        let parsed: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed[0]["_id"], "7");
        assert_eq!(parsed[0]["start"]["fullDate"], "01/01/2024");
    }
}
