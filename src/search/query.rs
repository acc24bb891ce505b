// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Search document construction

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Reserved field holding a document's content type
pub const FILTER_TYPE_FIELD: &str = "_rmtype";

/// Free-form search options. Unknown keys are kept in `extra` and end up at
/// the top level of the document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchOptions {
    #[serde(default)]
    pub filter: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<QueryOptions>,
    #[serde(default)]
    pub sort: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryOptions {
    #[serde(default, rename = "bool")]
    pub bool_query: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SearchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, clause: Value) -> Self {
        self.filter.push(clause);
        self
    }

    pub fn must(mut self, clause: Value) -> Self {
        self.query
            .get_or_insert_with(QueryOptions::default)
            .bool_query
            .insert("must".to_string(), clause);
        self
    }

    pub fn sort(mut self, clause: Value) -> Self {
        self.sort.push(clause);
        self
    }

    pub fn size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn min_score(mut self, min_score: f64) -> Self {
        self.min_score = Some(min_score);
        self
    }
}

/// Request body for the backend's `/search` endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    pub query: Query,
    pub sort: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    #[serde(rename = "bool")]
    pub bool_query: BoolQuery,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoolQuery {
    pub filter: Vec<Value>,
    pub must: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Build a search document scoped to `filter_type`.
///
/// Every `(field, value)` pair becomes a `match` clause appended after any
/// `must` clause from the options. The type clause
/// `{"term": {"_rmtype": filter_type}}` is always the last filter.
pub fn build_query(filter_type: &str, fields: &[(&str, Value)], options: &SearchOptions) -> SearchDocument {
    let query_options = options.query.clone().unwrap_or_default();
    let mut bool_extra = query_options.bool_query;

    let mut filter = options.filter.clone();
    if let Some(extra_filter) = bool_extra.remove("filter") {
        splice(&mut filter, extra_filter);
    }
    filter.push(json!({ "term": { FILTER_TYPE_FIELD: filter_type } }));

    let mut must = Vec::new();
    if let Some(default_must) = bool_extra.remove("must") {
        splice(&mut must, default_must);
    }
    must.extend(
        fields
            .iter()
            .map(|(field, value)| json!({ "match": { *field: value } })),
    );

    SearchDocument {
        size: options.size,
        query: Query {
            bool_query: BoolQuery {
                filter,
                must,
                extra: bool_extra,
            },
            extra: query_options.extra,
        },
        sort: options.sort.clone(),
        min_score: options.min_score,
        extra: options.extra.clone(),
    }
}

/// Arrays contribute each element, anything else but `null` is one clause.
fn splice(clauses: &mut Vec<Value>, value: Value) {
    match value {
        Value::Array(items) => clauses.extend(items),
        Value::Null => {}
        clause => clauses.push(clause),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_type_clause_and_field_matches() {
        let doc = build_query(
            "presenters",
            &[("name", json!("Eva")), ("city", json!("Gent"))],
            &SearchOptions::default(),
        );

        assert_eq!(doc.query.bool_query.filter, vec![json!({"term": {"_rmtype": "presenters"}})]);
        assert_eq!(
            doc.query.bool_query.must,
            vec![json!({"match": {"name": "Eva"}}), json!({"match": {"city": "Gent"}})]
        );
    }

    #[test]
    fn test_wire_format_without_options() {
        let doc = build_query("programs", &[("title", json!("Ochtend"))], &SearchOptions::default());
        assert_eq!(
            serde_json::to_value(&doc).unwrap(),
            json!({
                "query": {
                    "bool": {
                        "filter": [{"term": {"_rmtype": "programs"}}],
                        "must": [{"match": {"title": "Ochtend"}}]
                    }
                },
                "sort": []
            })
        );
    }

    #[test]
    fn test_options_filters_come_before_type_clause() {
        let options = SearchOptions::new().filter(json!({"match": {"presenters.name": "Eva"}}));
        let doc = build_query("broadcasts", &[], &options);
        assert_eq!(
            doc.query.bool_query.filter,
            vec![
                json!({"match": {"presenters.name": "Eva"}}),
                json!({"term": {"_rmtype": "broadcasts"}}),
            ]
        );
        assert!(doc.query.bool_query.must.is_empty());
    }

    #[test]
    fn test_options_must_is_prepended_not_deduplicated() {
        let options = SearchOptions::new().must(json!({"match": {"title": "Ochtend"}}));
        let doc = build_query("programs", &[("title", json!("Ochtend"))], &options);
        assert_eq!(
            doc.query.bool_query.must,
            vec![json!({"match": {"title": "Ochtend"}}), json!({"match": {"title": "Ochtend"}})]
        );
    }

    #[test]
    fn test_must_array_is_spliced() {
        let options = SearchOptions::new().must(json!([
            {"range": {"start": {"lte": "now"}}},
            {"exists": {"field": "title"}}
        ]));
        let doc = build_query("items", &[("artist", json!("X"))], &options);
        assert_eq!(doc.query.bool_query.must.len(), 3);
        assert_eq!(doc.query.bool_query.must[2], json!({"match": {"artist": "X"}}));
    }

    #[test]
    fn test_song_history_query() {
        let options = SearchOptions::new()
            .size(1)
            .must(json!({"range": {"start": {"lte": "now"}}}))
            .sort(json!({"start": {"order": "desc"}}));
        let doc = build_query("items", &[], &options);

        assert_eq!(
            serde_json::to_value(&doc).unwrap(),
            json!({
                "size": 1,
                "query": {
                    "bool": {
                        "filter": [{"term": {"_rmtype": "items"}}],
                        "must": [{"range": {"start": {"lte": "now"}}}]
                    }
                },
                "sort": [{"start": {"order": "desc"}}]
            })
        );
    }

    #[test]
    fn test_unknown_options_pass_through() {
        let options: SearchOptions = serde_json::from_value(json!({
            "size": 5,
            "min_score": 0.5,
            "from": 10,
            "_source": ["id", "title"],
            "query": {
                "bool": {"should": [{"match": {"genre": "pop"}}], "minimum_should_match": 1},
                "boost": 2
            }
        }))
        .unwrap();
        let doc = serde_json::to_value(build_query("items", &[], &options)).unwrap();

        assert_eq!(doc["size"], 5);
        assert_eq!(doc["min_score"], 0.5);
        assert_eq!(doc["from"], 10);
        assert_eq!(doc["_source"], json!(["id", "title"]));
        assert_eq!(doc["query"]["boost"], 2);
        assert_eq!(doc["query"]["bool"]["minimum_should_match"], 1);
        assert_eq!(doc["query"]["bool"]["should"][0]["match"]["genre"], "pop");
        assert_eq!(doc["query"]["bool"]["filter"], json!([{"term": {"_rmtype": "items"}}]));
    }

    #[test]
    fn test_bool_filter_cannot_drop_type_clause() {
        let options: SearchOptions = serde_json::from_value(json!({
            "query": {"bool": {"filter": {"exists": {"field": "start"}}}}
        }))
        .unwrap();
        let doc = build_query("broadcasts", &[], &options);
        assert_eq!(
            doc.query.bool_query.filter,
            vec![json!({"exists": {"field": "start"}}), json!({"term": {"_rmtype": "broadcasts"}})]
        );
    }
}
