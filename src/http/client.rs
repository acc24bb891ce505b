// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Signed request client implementation

use super::signing;
use super::{Method, RequestDescriptor, RequestError, TlsIdentity};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use std::str::FromStr;
use std::time::{Duration, Instant};

const BASE_HEADERS: [(&str, &str); 2] = [
    ("Accept", "application/json"),
    ("Content-Type", "application/json"),
];

#[derive(Debug, Clone)]
pub struct Client {
    inner: reqwest::Client,
}

impl Client {
    pub fn new() -> Result<Self, reqwest::Error> {
        Ok(Self {
            inner: builder().build()?,
        })
    }

    /// Client presenting `identity` on every TLS handshake
    pub fn with_identity(identity: &TlsIdentity) -> Result<Self, reqwest::Error> {
        let mut pem = identity.cert.clone().into_bytes();
        pem.push(b'\n');
        pem.extend_from_slice(identity.key.as_bytes());
        let identity = reqwest::Identity::from_pem(&pem)?;

        Ok(Self {
            inner: builder().identity(identity).build()?,
        })
    }

    /// Send one request and decode the JSON response body as `T`.
    ///
    /// Transient failures are re-dispatched up to `request.retry` times.
    pub async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        request: &RequestDescriptor,
    ) -> Result<T, RequestError> {
        let text = self.send_text(method, request).await?;
        let text = if text.trim().is_empty() { "null" } else { text.as_str() };

        serde_json::from_str(text).map_err(|source| RequestError::Decode {
            method,
            url: request.url.clone(),
            source,
        })
    }

    async fn send_text(&self, method: Method, request: &RequestDescriptor) -> Result<String, RequestError> {
        // A descriptor-level identity needs its own connection pool
        let client = match &request.tls {
            Some(identity) => Self::with_identity(identity).map_err(|e| RequestError::Tls {
                method,
                url: request.url.clone(),
                message: e.to_string(),
            })?,
            None => self.clone(),
        };

        let data = serialize_body(method, request)?;
        let headers = build_headers(method, request, &data)?;
        let retries = request.retry.unwrap_or(0);
        let mut last_error = None;

        for attempt in 0..=retries {
            if attempt > 0 {
                tracing::debug!(%method, url = %request.url, attempt, "retrying request");
            }

            match client.execute_once(method, request, headers.clone(), &data).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() => {
                    last_error = Some(e);
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| RequestError::Network {
            method,
            url: request.url.clone(),
            message: "no attempt was made".to_string(),
        }))
    }

    async fn execute_once(
        &self,
        method: Method,
        request: &RequestDescriptor,
        headers: HeaderMap,
        data: &str,
    ) -> Result<String, RequestError> {
        let start = Instant::now();

        let mut builder = self
            .inner
            .request(method.into(), &request.url)
            .headers(headers)
            .query(&request.query);

        if let Some(auth) = &request.auth {
            builder = builder.basic_auth(&auth.user, Some(&auth.password));
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        if method.sends_body() {
            builder = builder.body(data.to_string());
        }

        let response = builder.send().await.map_err(|e| transport_error(method, &request.url, e))?;

        let status = response.status();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map_or(false, |v| v.starts_with("application/json"));

        let body_text = response
            .text()
            .await
            .map_err(|e| transport_error(method, &request.url, e))?;

        tracing::debug!(
            %method,
            url = %request.url,
            status = status.as_u16(),
            duration_ms = start.elapsed().as_millis() as u64,
            "upstream responded"
        );

        if !status.is_success() {
            return Err(RequestError::Status {
                method,
                url: request.url.clone(),
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
                body: is_json.then_some(body_text),
            });
        }

        Ok(body_text)
    }
}

fn builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder().connect_timeout(Duration::from_secs(10))
}

/// The exact JSON text that is signed and, for non-GET methods, sent.
fn serialize_body(method: Method, request: &RequestDescriptor) -> Result<String, RequestError> {
    let empty = serde_json::Value::Object(serde_json::Map::new());
    let body = request.body.as_ref().unwrap_or(&empty);

    serde_json::to_string(body).map_err(|source| RequestError::Serialize {
        method,
        url: request.url.clone(),
        source,
    })
}

fn build_headers(method: Method, request: &RequestDescriptor, data: &str) -> Result<HeaderMap, RequestError> {
    let mut headers = HeaderMap::new();

    let base = BASE_HEADERS.iter().map(|(k, v)| (k.to_string(), v.to_string()));
    let caller = request.headers.iter().map(|(k, v)| (k.clone(), v.clone()));
    let signed = request
        .hmac
        .iter()
        .flat_map(|config| signing::sign_now(config, data).to_pairs(method.sends_body()));

    // Later entries win: caller headers over base headers, signature over both
    for (key, value) in base.chain(caller).chain(signed) {
        let invalid = || RequestError::InvalidHeader {
            method,
            url: request.url.clone(),
            name: key.clone(),
        };
        let header_name = HeaderName::from_str(&key).map_err(|_| invalid())?;
        let header_value = HeaderValue::from_str(&value).map_err(|_| invalid())?;
        headers.insert(header_name, header_value);
    }

    Ok(headers)
}

fn transport_error(method: Method, url: &str, err: reqwest::Error) -> RequestError {
    if err.is_timeout() {
        RequestError::Timeout {
            method,
            url: url.to_string(),
        }
    } else {
        RequestError::Network {
            method,
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}
