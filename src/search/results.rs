// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Normalization of search hits into flat records

use super::dates::{format_date, parse_timestamp, FormattedDate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Source fields that get reshaped instead of copied to the top level
pub const RESHAPED_FIELDS: [&str; 4] = ["field_values", "presenters", "start", "stop"];

/// Response body of the backend's `/search` endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hits: Option<HitList>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HitList {
    #[serde(default)]
    pub hits: Vec<Hit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_source", default)]
    pub source: Map<String, Value>,
}

/// One hit, flattened for the dialog session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_values: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presenters: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<FormattedDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<FormattedDate>,
}

impl Record {
    /// A flattened source field
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// Normalize every hit, formatting dates relative to the current time.
pub fn extract_results(response: &SearchResponse) -> Vec<Record> {
    extract_results_at(response, Utc::now())
}

/// Normalize every hit, in order, with a fixed notion of "now".
pub fn extract_results_at(response: &SearchResponse, now: DateTime<Utc>) -> Vec<Record> {
    response
        .hits
        .as_ref()
        .map(|list| list.hits.iter().map(|hit| normalize_hit(hit, now)).collect())
        .unwrap_or_default()
}

fn normalize_hit(hit: &Hit, now: DateTime<Utc>) -> Record {
    let fields = hit
        .source
        .iter()
        .filter(|(key, _)| !RESHAPED_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Record {
        id: hit.id.clone(),
        fields,
        field_values: present(&hit.source, "field_values").cloned(),
        presenters: present(&hit.source, "presenters").and_then(presenter_names),
        start: present(&hit.source, "start").and_then(|v| formatted(&hit.id, "start", v, now)),
        stop: present(&hit.source, "stop").and_then(|v| formatted(&hit.id, "stop", v, now)),
    }
}

/// Field value unless missing, `null` or an empty string
fn present<'a>(source: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    source.get(field).filter(|value| match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    })
}

fn presenter_names(value: &Value) -> Option<Vec<String>> {
    let presenters = value.as_array()?;
    Some(
        presenters
            .iter()
            .filter_map(|presenter| presenter.get("name").and_then(Value::as_str))
            .map(str::to_string)
            .collect(),
    )
}

fn formatted(id: &str, field: &str, value: &Value, now: DateTime<Utc>) -> Option<FormattedDate> {
    match parse_timestamp(value) {
        Some(at) => Some(format_date(at, now)),
        None => {
            tracing::warn!(hit = %id, field, value = %value, "dropping unparseable timestamp");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::dates::TODAY;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn response(value: Value) -> SearchResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_missing_or_empty_hits() {
        assert!(extract_results(&response(json!({}))).is_empty());
        assert!(extract_results(&response(json!({"hits": {}}))).is_empty());
        assert!(extract_results(&response(json!({"hits": {"hits": []}}))).is_empty());
    }

    #[test]
    fn test_flattens_source_and_keeps_field_values_nested() {
        let records = extract_results_at(
            &response(json!({"hits": {"hits": [{
                "_id": "12",
                "_source": {
                    "id": 12,
                    "title": "Ochtendshow",
                    "field_values": {"genre": "pop"}
                }
            }]}})),
            now(),
        );

        assert_eq!(
            serde_json::to_value(&records).unwrap(),
            json!([{
                "_id": "12",
                "id": 12,
                "title": "Ochtendshow",
                "field_values": {"genre": "pop"}
            }])
        );
        assert_eq!(records[0].get("title"), Some(&json!("Ochtendshow")));
    }

    #[test]
    fn test_presenters_become_names() {
        let records = extract_results_at(
            &response(json!({"hits": {"hits": [{
                "_id": "3",
                "_source": {"presenters": [
                    {"name": "A", "id": 1, "href": "/presenters/1"},
                    {"name": "B", "id": 2}
                ]}
            }]}})),
            now(),
        );
        assert_eq!(records[0].presenters, Some(vec!["A".to_string(), "B".to_string()]));

        let json = serde_json::to_value(&records[0]).unwrap();
        assert_eq!(json["presenters"], json!(["A", "B"]));
        assert!(json.get("id").is_none());
    }

    #[test]
    fn test_dates_are_formatted() {
        let records = extract_results_at(
            &response(json!({"hits": {"hits": [{
                "_id": "9",
                "_source": {
                    "start": "2024-06-01T08:00:00Z",
                    "stop": "2024-05-29T09:30:00Z"
                }
            }]}})),
            now(),
        );

        let start = records[0].start.as_ref().unwrap();
        assert_eq!(start.full_date, "01/06/2024");
        assert_eq!(start.time, "10:00");
        assert_eq!(start.day, TODAY);

        let stop = records[0].stop.as_ref().unwrap();
        assert_eq!(stop.full_date, "29/05/2024");
        assert_eq!(stop.time, "11:30");
        assert_eq!(stop.day, "woensdag");
    }

    #[test]
    fn test_absent_and_invalid_reshaped_fields_are_omitted() {
        let records = extract_results_at(
            &response(json!({"hits": {"hits": [{
                "_id": "4",
                "_source": {"title": "X", "start": "not a date", "stop": null, "field_values": null}
            }]}})),
            now(),
        );
        assert_eq!(serde_json::to_value(&records[0]).unwrap(), json!({"_id": "4", "title": "X"}));
    }

    #[test]
    fn test_order_is_preserved() {
        let records = extract_results_at(
            &response(json!({"hits": {"hits": [
                {"_id": "c", "_source": {}},
                {"_id": "a", "_source": {}},
                {"_id": "b"}
            ]}})),
            now(),
        );
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let raw = response(json!({"hits": {"hits": [{
            "_id": "1",
            "_source": {"id": 1, "presenters": [{"name": "A"}], "start": "2024-01-01T10:00:00Z"}
        }]}}));
        assert_eq!(extract_results_at(&raw, now()), extract_results_at(&raw, now()));
    }
}
