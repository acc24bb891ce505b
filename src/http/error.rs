// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Outbound request errors

use super::Method;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("Network error: {method} {url}: {message}")]
    Network {
        method: Method,
        url: String,
        message: String,
    },

    #[error("Timeout: {method} {url}")]
    Timeout { method: Method, url: String },

    #[error("HTTP {status} {status_text}: {method} {url}")]
    Status {
        method: Method,
        url: String,
        status: u16,
        status_text: String,
        /// Raw response text, kept only when the upstream answered JSON
        body: Option<String>,
    },

    #[error("Invalid header: {name}")]
    InvalidHeader {
        method: Method,
        url: String,
        name: String,
    },

    #[error("Invalid client certificate: {message}")]
    Tls {
        method: Method,
        url: String,
        message: String,
    },

    #[error("Failed to serialize request body: {source}")]
    Serialize {
        method: Method,
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to decode response from {method} {url}: {source}")]
    Decode {
        method: Method,
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Flat, serialization-safe summary of a failed request for logging
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDiagnostic {
    pub message: String,
    pub request: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(rename = "statusText", skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
}

impl RequestError {
    pub fn method(&self) -> Method {
        match self {
            Self::Network { method, .. }
            | Self::Timeout { method, .. }
            | Self::Status { method, .. }
            | Self::InvalidHeader { method, .. }
            | Self::Tls { method, .. }
            | Self::Serialize { method, .. }
            | Self::Decode { method, .. } => *method,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Self::Network { url, .. }
            | Self::Timeout { url, .. }
            | Self::Status { url, .. }
            | Self::InvalidHeader { url, .. }
            | Self::Tls { url, .. }
            | Self::Serialize { url, .. }
            | Self::Decode { url, .. } => url,
        }
    }

    /// HTTP status returned by the upstream, if it answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Failures worth re-dispatching the same request for
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Timeout { .. } => true,
            Self::Status { status, .. } => {
                matches!(status, 408 | 413 | 429 | 500 | 502 | 503 | 504 | 521 | 522 | 524)
            }
            _ => false,
        }
    }

    /// Reduce the error to method + URL, response text and status text.
    pub fn sanitize(&self) -> ErrorDiagnostic {
        let (response, status_text) = match self {
            Self::Status {
                body, status_text, ..
            } => (body.clone(), Some(status_text.clone())),
            _ => (None, None),
        };

        ErrorDiagnostic {
            message: self.to_string(),
            request: format!("{} {}", self.method(), self.url()),
            response,
            status_text,
        }
    }
}
