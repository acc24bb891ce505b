// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Content search: query construction and hit normalization

pub mod dates;
mod query;
mod results;

pub use dates::FormattedDate;
pub use query::{build_query, BoolQuery, Query, QueryOptions, SearchDocument, SearchOptions, FILTER_TYPE_FIELD};
pub use results::{extract_results, extract_results_at, Hit, HitList, Record, SearchResponse};

use crate::http::{BoundClient, CallOptions, RequestError};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Path of the search endpoint relative to the backend base URL
pub const SEARCH_ROUTE: &str = "/search";

/// Build, send and normalize one search against the bound backend.
pub async fn search(
    client: &BoundClient,
    filter_type: &str,
    fields: &[(&str, Value)],
    options: &SearchOptions,
) -> Result<Vec<Record>, RequestError> {
    search_at(client, filter_type, fields, options, Utc::now()).await
}

/// Like [`search`], with `now` deciding which dates are labelled today.
pub async fn search_at(
    client: &BoundClient,
    filter_type: &str,
    fields: &[(&str, Value)],
    options: &SearchOptions,
    now: DateTime<Utc>,
) -> Result<Vec<Record>, RequestError> {
    let document = build_query(filter_type, fields, options);
    let body = serde_json::to_value(&document).map_err(|source| RequestError::Serialize {
        method: crate::http::Method::Post,
        url: format!("{}{}", client.base_url(), SEARCH_ROUTE),
        source,
    })?;

    tracing::debug!(filter_type, body = %body, "searching");
    let response: SearchResponse = client
        .post(SEARCH_ROUTE, CallOptions { body: Some(body), ..Default::default() })
        .await?;

    Ok(extract_results_at(&response, now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::ClientOptions;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_search_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_json(json!({
                "size": 1,
                "query": {
                    "bool": {
                        "filter": [{"term": {"_rmtype": "songs"}}],
                        "must": []
                    }
                },
                "sort": [{"start": {"order": "desc"}}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "hits": {"hits": [{
                    "_id": "1",
                    "_source": {"id": 5, "title": "X", "start": "2024-01-01T10:00:00Z"}
                }]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = BoundClient::new(ClientOptions {
            base_url: server.uri(),
            ..Default::default()
        })
        .unwrap();
        let options = SearchOptions::new().size(1).sort(json!({"start": {"order": "desc"}}));
        let now = DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z").unwrap().with_timezone(&Utc);
        let records = search_at(&client, "songs", &[], &options, now).await.unwrap();

        assert_eq!(
            serde_json::to_value(&records).unwrap(),
            json!([{
                "_id": "1",
                "id": 5,
                "title": "X",
                "start": {"fullDate": "01/01/2024", "time": "11:00", "day": "maandag"}
            }])
        );
    }

    #[tokio::test]
    async fn test_search_propagates_upstream_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = BoundClient::new(ClientOptions {
            base_url: server.uri(),
            ..Default::default()
        })
        .unwrap();
        let err = search(&client, "programs", &[("title", json!("X"))], &SearchOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));
    }
}
