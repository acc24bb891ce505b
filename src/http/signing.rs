// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HMAC request signing
//!
//! The backend verifies requests by recomputing:
//!
//! ```text
//! auth_data = body \n timestamp \n nonce \n key
//! auth_hash = hex(digest(auth_data))
//! signature = base64(hmac(secret, auth_hash))
//! ```
//!
//! `body` is the exact JSON string that goes on the wire.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha384, Sha512};

const NONCE_BYTES: usize = 24;

/// Digest used both for the intermediate hash and the HMAC
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

/// HMAC signing settings
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HmacConfig {
    /// Signing key identifier, part of the signed data
    pub key: String,
    /// Header carrying the signature
    #[serde(default = "default_header")]
    pub header: String,
    pub secret: String,
    #[serde(default, alias = "encoding")]
    pub algorithm: DigestAlgorithm,
}

impl std::fmt::Debug for HmacConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacConfig")
            .field("key", &self.key)
            .field("header", &self.header)
            .field("secret", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

fn default_header() -> String {
    "hash".to_string()
}

impl HmacConfig {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            header: default_header(),
            secret: secret.into(),
            algorithm: DigestAlgorithm::default(),
        }
    }
}

/// Headers produced by signing one request body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeaders {
    pub signature_header: String,
    pub signature: String,
    pub nonce: String,
    pub timestamp: String,
    pub charset: &'static str,
    pub content_length: usize,
}

impl SignatureHeaders {
    /// Header name/value pairs in the order they are attached
    pub fn to_pairs(&self, include_length: bool) -> Vec<(String, String)> {
        let mut pairs = vec![
            (self.signature_header.clone(), self.signature.clone()),
            ("nonce".to_string(), self.nonce.clone()),
            ("timestamp".to_string(), self.timestamp.clone()),
            ("charset".to_string(), self.charset.to_string()),
        ];
        if include_length {
            pairs.push(("Content-Length".to_string(), self.content_length.to_string()));
        }
        pairs
    }
}

/// Sign a serialized body with an explicit timestamp and nonce.
pub fn sign(config: &HmacConfig, data: &str, timestamp: &str, nonce: &str) -> SignatureHeaders {
    let auth_data = [data, timestamp, nonce, config.key.as_str()].join("\n");
    let (auth_hash, mac) = match config.algorithm {
        DigestAlgorithm::Sha256 => {
            let auth_hash = hex::encode(Sha256::digest(auth_data.as_bytes()));
            let mac = keyed_mac::<Hmac<Sha256>>(&config.secret, &auth_hash);
            (auth_hash, mac)
        }
        DigestAlgorithm::Sha384 => {
            let auth_hash = hex::encode(Sha384::digest(auth_data.as_bytes()));
            let mac = keyed_mac::<Hmac<Sha384>>(&config.secret, &auth_hash);
            (auth_hash, mac)
        }
        DigestAlgorithm::Sha512 => {
            let auth_hash = hex::encode(Sha512::digest(auth_data.as_bytes()));
            let mac = keyed_mac::<Hmac<Sha512>>(&config.secret, &auth_hash);
            (auth_hash, mac)
        }
    };
    tracing::trace!(auth_hash = %auth_hash, "computed intermediate request hash");

    SignatureHeaders {
        signature_header: config.header.clone(),
        signature: STANDARD.encode(mac),
        nonce: nonce.to_string(),
        timestamp: timestamp.to_string(),
        charset: "utf8",
        content_length: data.len(),
    }
}

/// Sign with the current time and a fresh random nonce.
pub fn sign_now(config: &HmacConfig, data: &str) -> SignatureHeaders {
    sign(config, data, &iso_timestamp(Utc::now()), &random_nonce())
}

/// ISO-8601 UTC timestamp with millisecond precision
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// 24 random bytes, hex encoded
pub fn random_nonce() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn keyed_mac<M: Mac + hmac::digest::KeyInit>(secret: &str, message: &str) -> Vec<u8> {
    let mut mac = <M as hmac::digest::KeyInit>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    mac.finalize().into_bytes().to_vec()
}
