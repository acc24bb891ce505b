// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dialog-engine HTTP routes
//!
//! | Method | Path | Looks up |
//! |--------|------|----------|
//! | `GET` | `/` | Health check |
//! | `GET` | `/presenters?name=` | Presenter by name |
//! | `GET` | `/programs?title=` | Program by title |
//! | `GET` | `/broadcasts?presenter=` | Broadcasts, optionally by presenter |
//! | `GET` | `/broadcasts/current` | Broadcast on air |
//! | `GET` | `/broadcasts/next` | Next broadcast |
//! | `GET` | `/songs` | All songs |
//! | `GET` | `/songs/last` | Last started song |
//! | `GET` | `/songs/current` | Song on air |
//!
//! Every route also takes `successfulDS`, `notFoundDS` and `varKey`. The
//! dialog engine always gets a 200: failures answer with
//! `{"action": {"nextDialogstate": <notFoundDS>}}`.

use axum::{
    extract::{FromRequestParts, Query, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::http::{BoundClient, CallOptions, RequestError};
use crate::search::{search, Record, SearchOptions};

#[derive(Clone)]
struct AppState {
    client: Arc<BoundClient>,
}

/// Query parameters shared by all dialog routes
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DialogQuery {
    #[serde(rename = "successfulDS")]
    pub successful_ds: Option<String>,
    #[serde(rename = "notFoundDS")]
    pub not_found_ds: Option<String>,
    #[serde(rename = "varKey")]
    pub var_key: Option<String>,
    pub name: Option<String>,
    pub title: Option<String>,
    pub presenter: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DialogResponse {
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,
}

#[derive(Debug, Serialize)]
pub struct Action {
    #[serde(rename = "nextDialogstate")]
    pub next_dialogstate: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Session {
    pub namespace: Option<String>,
    pub data: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum DialogError {
    #[error("missing query parameter '{0}'")]
    MissingParameter(&'static str),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] RequestError),

    #[error("nothing found: {0}")]
    NotFound(String),

    #[error("unexpected backend response: {0}")]
    UnexpectedShape(String),

    #[error("malformed query string: {0}")]
    MalformedQuery(String),
}

/// A failed dialog route, answered with the not-found dialog state
struct DialogFailure {
    not_found_ds: Option<String>,
    error: DialogError,
}

impl IntoResponse for DialogFailure {
    fn into_response(self) -> Response {
        match &self.error {
            DialogError::Upstream(err) => {
                let diagnostic = serde_json::to_string(&err.sanitize()).unwrap_or_default();
                tracing::error!(%diagnostic, "dialog route failed");
            }
            other => tracing::info!(error = %other, "dialog route answered not found"),
        }

        let body = DialogResponse {
            action: Action {
                next_dialogstate: self.not_found_ds,
            },
            session: None,
        };
        (StatusCode::OK, Json(body)).into_response()
    }
}

type DialogResult = Result<Json<DialogResponse>, DialogFailure>;

/// Dialog query parameters. A query string that does not deserialize still
/// answers with whatever `notFoundDS` can be read from it.
struct Dialog(DialogQuery);

impl<S: Send + Sync> FromRequestParts<S> for Dialog {
    type Rejection = DialogFailure;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match Query::<DialogQuery>::try_from_uri(&parts.uri) {
            Ok(Query(query)) => Ok(Dialog(query)),
            Err(rejection) => Err(DialogFailure {
                not_found_ds: lenient_not_found_ds(parts.uri.query().unwrap_or_default()),
                error: DialogError::MalformedQuery(rejection.body_text()),
            }),
        }
    }
}

fn lenient_not_found_ds(raw: &str) -> Option<String> {
    url::form_urlencoded::parse(raw.as_bytes())
        .find(|(key, _)| key == "notFoundDS")
        .map(|(_, value)| value.into_owned())
}

fn reply(query: &DialogQuery, data: Result<Value, DialogError>) -> DialogResult {
    match data {
        Ok(data) => Ok(Json(DialogResponse {
            action: Action {
                next_dialogstate: query.successful_ds.clone(),
            },
            session: Some(Session {
                namespace: query.var_key.clone(),
                data,
            }),
        })),
        Err(error) => Err(DialogFailure {
            not_found_ds: query.not_found_ds.clone(),
            error,
        }),
    }
}

/// Build the dialog router around a bound backend client.
pub fn router(client: BoundClient) -> Router {
    let state = AppState {
        client: Arc::new(client),
    };

    Router::new()
        .route("/", get(handle_health))
        .route("/presenters", get(handle_presenters))
        .route("/programs", get(handle_programs))
        .route("/broadcasts", get(handle_broadcasts))
        .route("/broadcasts/current", get(handle_broadcast_current))
        .route("/broadcasts/next", get(handle_broadcast_next))
        .route("/songs", get(handle_songs))
        .route("/songs/last", get(handle_song_last))
        .route("/songs/current", get(handle_song_current))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the dialog routes until SIGINT, SIGTERM or SIGQUIT.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let client = BoundClient::new(config.client_options()?)?;
    let app = router(client);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, backend = %config.backend.url, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match (signal(SignalKind::terminate()), signal(SignalKind::quit())) {
            (Ok(mut term), Ok(mut quit)) => {
                tokio::select! {
                    _ = term.recv() => {},
                    _ = quit.recv() => {},
                }
            }
            _ => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

// ============ Handlers ============

async fn handle_health() -> StatusCode {
    StatusCode::OK
}

async fn handle_presenters(State(state): State<AppState>, Dialog(query): Dialog) -> DialogResult {
    reply(&query, presenter(&state.client, query.name.as_deref()).await)
}

async fn handle_programs(State(state): State<AppState>, Dialog(query): Dialog) -> DialogResult {
    reply(&query, program(&state.client, query.title.as_deref()).await)
}

async fn handle_broadcasts(State(state): State<AppState>, Dialog(query): Dialog) -> DialogResult {
    reply(&query, broadcasts(&state.client, query.presenter.as_deref()).await)
}

async fn handle_broadcast_current(State(state): State<AppState>, Dialog(query): Dialog) -> DialogResult {
    reply(&query, broadcast_with_presenters(&state.client, "/broadcasts/current").await)
}

async fn handle_broadcast_next(State(state): State<AppState>, Dialog(query): Dialog) -> DialogResult {
    reply(&query, broadcast_with_presenters(&state.client, "/broadcasts/next").await)
}

async fn handle_songs(State(state): State<AppState>, Dialog(query): Dialog) -> DialogResult {
    reply(&query, fetch(&state.client, "/items").await)
}

async fn handle_song_last(State(state): State<AppState>, Dialog(query): Dialog) -> DialogResult {
    reply(&query, last_song(&state.client).await)
}

async fn handle_song_current(State(state): State<AppState>, Dialog(query): Dialog) -> DialogResult {
    reply(&query, fetch(&state.client, "/items/current").await)
}

// ============ Route logic ============

async fn fetch(client: &BoundClient, route: &str) -> Result<Value, DialogError> {
    Ok(client.get(route, CallOptions::new()).await?)
}

async fn presenter(client: &BoundClient, name: Option<&str>) -> Result<Value, DialogError> {
    let name = required(name, "name")?;
    let hit = first_hit(client, "presenters", &[("name", json!(name))], &SearchOptions::new()).await?;
    let presenter: Value = client
        .get(&format!("/presenters/{}", record_id(&hit)?), CallOptions::new())
        .await?;

    Ok(pick_with_field_values(&presenter, &["id", "name"]))
}

async fn program(client: &BoundClient, title: Option<&str>) -> Result<Value, DialogError> {
    let title = required(title, "title")?;
    let hit = first_hit(client, "programs", &[("title", json!(title))], &SearchOptions::new()).await?;
    let program: Value = client
        .get(&format!("/programs/{}", record_id(&hit)?), CallOptions::new())
        .await?;
    if program.is_null() {
        return Err(DialogError::NotFound(format!("program {}", hit.id)));
    }

    Ok(pick_with_field_values(
        &program,
        &["id", "title", "description", "short_name", "medium_name"],
    ))
}

async fn broadcasts(client: &BoundClient, presenter: Option<&str>) -> Result<Value, DialogError> {
    let options = match presenter.filter(|p| !p.is_empty()) {
        Some(name) => SearchOptions::new().filter(json!({ "match": { "presenters.name": name } })),
        None => SearchOptions::new(),
    };

    let records = search(client, "broadcasts", &[], &options).await?;
    if records.is_empty() {
        return Err(DialogError::NotFound("broadcasts".to_string()));
    }

    serde_json::to_value(&records).map_err(|e| DialogError::UnexpectedShape(e.to_string()))
}

async fn broadcast_with_presenters(client: &BoundClient, route: &str) -> Result<Value, DialogError> {
    let broadcast: Value = client.get(route, CallOptions::new()).await?;
    let mut broadcast = match broadcast {
        Value::Object(map) => map,
        other => return Err(DialogError::UnexpectedShape(format!("{} returned {}", route, other))),
    };

    let href = broadcast
        .remove("presenters")
        .and_then(|p| p.get("href").and_then(Value::as_str).map(str::to_string))
        .ok_or_else(|| DialogError::UnexpectedShape(format!("{} has no presenters link", route)))?;
    let presenters_route = relative_route(client.base_url(), &href)
        .ok_or_else(|| DialogError::UnexpectedShape(format!("unusable presenters link {}", href)))?;

    let listing: Value = client.get(&presenters_route, CallOptions::new()).await?;
    let names: Vec<Value> = listing
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| DialogError::UnexpectedShape(format!("{} has no results", presenters_route)))?
        .iter()
        .map(|p| p.get("name").cloned().unwrap_or(Value::Null))
        .collect();

    broadcast.insert("presenters".to_string(), Value::Array(names));
    Ok(Value::Object(broadcast))
}

async fn last_song(client: &BoundClient) -> Result<Value, DialogError> {
    let options = SearchOptions::new()
        .size(1)
        .must(json!({ "range": { "start": { "lte": "now" } } }))
        .sort(json!({ "start": { "order": "desc" } }));
    let hit = first_hit(client, "items", &[], &options).await?;

    let song: Value = client
        .get(&format!("/items/{}", record_id(&hit)?), CallOptions::new())
        .await?;
    if song.is_null() {
        return Err(DialogError::NotFound(format!("item {}", hit.id)));
    }

    let mut data = Map::new();
    for field in ["id", "title"] {
        if let Some(value) = song.get(field) {
            data.insert(field.to_string(), value.clone());
        }
    }
    if let Some(artist) = song.get("field_values").and_then(|fv| fv.get("artist")) {
        data.insert("artist".to_string(), artist.clone());
    }
    Ok(Value::Object(data))
}

// ============ Helpers ============

fn required<'a>(value: Option<&'a str>, name: &'static str) -> Result<&'a str, DialogError> {
    value.filter(|v| !v.is_empty()).ok_or(DialogError::MissingParameter(name))
}

async fn first_hit(
    client: &BoundClient,
    filter_type: &str,
    fields: &[(&str, Value)],
    options: &SearchOptions,
) -> Result<Record, DialogError> {
    search(client, filter_type, fields, options)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| DialogError::NotFound(filter_type.to_string()))
}

/// The content id of a hit as a path segment
fn record_id(record: &Record) -> Result<String, DialogError> {
    match record.get("id") {
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        _ => Err(DialogError::UnexpectedShape(format!("hit {} has no id", record.id))),
    }
}

/// Copy `fields` that are present, then spread `field_values` over them.
fn pick_with_field_values(source: &Value, fields: &[&str]) -> Value {
    let mut data = Map::new();
    for field in fields {
        if let Some(value) = source.get(*field) {
            data.insert(field.to_string(), value.clone());
        }
    }
    if let Some(Value::Object(field_values)) = source.get("field_values") {
        data.extend(field_values.clone());
    }
    Value::Object(data)
}

/// Route of `href` relative to the backend base URL. Links may be absolute
/// (possibly on another host) or relative to the base.
fn relative_route(base_url: &str, href: &str) -> Option<String> {
    let base = url::Url::parse(base_url).ok()?;
    let target = base.join(href).ok()?;
    let base_path = base.path().trim_end_matches('/');
    let rest = target.path().strip_prefix(base_path)?;
    if !rest.is_empty() && !rest.starts_with('/') {
        return None;
    }

    let mut route = rest.to_string();
    if let Some(query) = target.query() {
        route.push('?');
        route.push_str(query);
    }
    Some(route)
}
