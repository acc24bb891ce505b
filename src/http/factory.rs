// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bound clients: a base URL plus default request options

use super::{BasicAuth, Client, HmacConfig, Method, RequestDescriptor, RequestError, TlsIdentity};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// Defaults shared by every request of a [`BoundClient`]
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    pub base_url: String,
    pub headers: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub auth: Option<BasicAuth>,
    pub tls: Option<TlsIdentity>,
    pub hmac: Option<HmacConfig>,
    pub timeout: Option<Duration>,
    pub retry: Option<u32>,
}

/// Per-call overrides
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub headers: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub body: Option<serde_json::Value>,
    pub timeout: Option<Duration>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn json<B: Serialize>(mut self, body: &B) -> Result<Self, serde_json::Error> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Client bound to one backend. Auth, TLS identity, HMAC and retry are
/// fixed per instance; headers, query, body and timeout vary per call.
#[derive(Debug, Clone)]
pub struct BoundClient {
    options: ClientOptions,
    client: Client,
}

impl BoundClient {
    pub fn new(options: ClientOptions) -> Result<Self> {
        let client = match &options.tls {
            Some(identity) => Client::with_identity(identity).context("Invalid client certificate")?,
            None => Client::new().context("Failed to create HTTP client")?,
        };

        Ok(Self { options, client })
    }

    pub fn base_url(&self) -> &str {
        &self.options.base_url
    }

    /// Merge the client defaults with one call's overrides.
    pub fn request(&self, route: &str, call: CallOptions) -> RequestDescriptor {
        let mut headers = self.options.headers.clone();
        headers.extend(call.headers);
        let mut query = self.options.query.clone();
        query.extend(call.query);

        RequestDescriptor {
            url: format!("{}{}", self.options.base_url, route),
            headers,
            query,
            body: call.body,
            auth: self.options.auth.clone(),
            // The identity already lives in `self.client`
            tls: None,
            timeout: call.timeout.or(self.options.timeout),
            retry: self.options.retry,
            hmac: self.options.hmac.clone(),
        }
    }

    pub async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        route: &str,
        call: CallOptions,
    ) -> Result<T, RequestError> {
        let request = self.request(route, call);
        self.client.send(method, &request).await
    }

    pub async fn get<T: DeserializeOwned>(&self, route: &str, call: CallOptions) -> Result<T, RequestError> {
        self.send(Method::Get, route, call).await
    }

    pub async fn post<T: DeserializeOwned>(&self, route: &str, call: CallOptions) -> Result<T, RequestError> {
        self.send(Method::Post, route, call).await
    }

    pub async fn put<T: DeserializeOwned>(&self, route: &str, call: CallOptions) -> Result<T, RequestError> {
        self.send(Method::Put, route, call).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, route: &str, call: CallOptions) -> Result<T, RequestError> {
        self.send(Method::Delete, route, call).await
    }

    pub async fn patch<T: DeserializeOwned>(&self, route: &str, call: CallOptions) -> Result<T, RequestError> {
        self.send(Method::Patch, route, call).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn options(base_url: &str) -> ClientOptions {
        ClientOptions {
            base_url: base_url.to_string(),
            headers: HashMap::from([
                ("api-key".to_string(), "abc".to_string()),
                ("x-client".to_string(), "default".to_string()),
            ]),
            query: HashMap::from([("lang".to_string(), "nl".to_string())]),
            timeout: Some(Duration::from_secs(5)),
            retry: Some(2),
            ..Default::default()
        }
    }

    #[test]
    fn test_new_rejects_invalid_identity() {
        let mut options = options("http://backend");
        options.tls = Some(TlsIdentity {
            cert: "not a certificate".to_string(),
            key: "not a key".to_string(),
        });
        let err = BoundClient::new(options).err().unwrap();
        assert!(err.to_string().contains("Invalid client certificate"));
    }

    #[test]
    fn test_new_accepts_identity_and_keeps_it_off_descriptors() {
        let mut options = options("http://backend");
        options.tls = Some(TlsIdentity {
            cert: include_str!("testdata/client.crt").to_string(),
            key: include_str!("testdata/client.key").to_string(),
        });
        let client = BoundClient::new(options).unwrap();
        assert!(client.request("/items", CallOptions::new()).tls.is_none());
    }

    #[test]
    fn test_request_layers_call_options_over_defaults() {
        let client = BoundClient::new(options("http://backend/api/v2")).unwrap();
        let request = client.request(
            "/programs/4",
            CallOptions::new()
                .header("x-client", "call")
                .query("page", "3")
                .timeout(Duration::from_secs(1)),
        );

        assert_eq!(request.url, "http://backend/api/v2/programs/4");
        assert_eq!(request.headers["api-key"], "abc");
        assert_eq!(request.headers["x-client"], "call");
        assert_eq!(request.query["lang"], "nl");
        assert_eq!(request.query["page"], "3");
        assert_eq!(request.timeout, Some(Duration::from_secs(1)));
        assert_eq!(request.retry, Some(2));
    }

    #[test]
    fn test_request_keeps_default_timeout() {
        let client = BoundClient::new(options("http://backend")).unwrap();
        let request = client.request("/items", CallOptions::new());
        assert_eq!(request.timeout, Some(Duration::from_secs(5)));
        assert!(request.body.is_none());
    }

    #[test]
    fn test_hmac_and_auth_are_fixed_per_client() {
        let mut opts = options("http://backend");
        opts.hmac = Some(HmacConfig::new("k", "s"));
        opts.auth = Some(BasicAuth {
            user: "u".to_string(),
            password: "p".to_string(),
        });
        let client = BoundClient::new(opts).unwrap();
        let request = client.request("/search", CallOptions::new());
        assert_eq!(request.hmac.unwrap().key, "k");
        assert_eq!(request.auth.unwrap().user, "u");
    }

    #[tokio::test]
    async fn test_verbs_hit_the_bound_backend() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items/current"))
            .and(header("api-key", "abc"))
            .and(query_param("lang", "nl"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/items/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"patched": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = BoundClient::new(options(&server.uri())).unwrap();
        let current: Value = client.get("/items/current", CallOptions::new()).await.unwrap();
        assert_eq!(current["id"], 7);

        let patched: Value = client
            .patch("/items/7", CallOptions::new().json(&json!({"title": "X"})).unwrap())
            .await
            .unwrap();
        assert_eq!(patched["patched"], true);
    }
}
