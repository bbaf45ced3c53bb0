// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! HTTP transport seam.
//!
//! Every component talks to the NVR through [`Transport`], which only fails
//! on connection-level problems. Status codes come back inside [`Response`]
//! because each caller applies its own policy to them: the direct clip tier
//! aborts on a bad status, the availability check reports "unavailable", the
//! export status lookup retries an alternative path on `405`.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::config::ServerConfig;
use crate::error::{NvrError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub json: Option<serde_json::Value>,
}

impl Request {
    pub fn get(url: Url) -> Self {
        Self { method: Method::Get, url, json: None }
    }

    pub fn post_json(url: Url, body: serde_json::Value) -> Self {
        Self { method: Method::Post, url, json: Some(body) }
    }

    pub fn delete(url: Url) -> Self {
        Self { method: Method::Delete, url, json: None }
    }
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub url: String,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx response into [`NvrError::HttpStatus`].
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(NvrError::HttpStatus { status: self.status, url: self.url })
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| NvrError::decode(&self.url, e))
    }

    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec()).map_err(|e| NvrError::decode(&self.url, e))
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one request. Errors only on transport failure.
    async fn send(&self, request: Request) -> Result<Response>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: Request) -> Result<Response> {
        (**self).send(request).await
    }
}

pub type SharedTransport = Arc<dyn Transport>;

// ──────────────── reqwest implementation ──────────────────────────────────

/// [`Transport`] backed by a `reqwest` client with the server's auth headers.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(server: &ServerConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in server.auth_headers() {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| NvrError::Config(format!("Invalid header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(&value)
                .map_err(|e| NvrError::Config(format!("Invalid value for header '{name}': {e}")))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .default_headers(headers)
            .timeout(server.request_timeout())
            .build()
            .map_err(|e| NvrError::Config(format!("HTTP client: {e}")))?;

        Ok(Self { client })
    }

    pub fn shared(server: &ServerConfig) -> Result<SharedTransport> {
        Ok(Arc::new(Self::new(server)?))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: Request) -> Result<Response> {
        let url = request.url.clone();
        let builder = match request.method {
            Method::Get => self.client.get(request.url),
            Method::Post => self.client.post(request.url),
            Method::Delete => self.client.delete(request.url),
        };
        let builder = match request.json {
            Some(body) => builder.json(&body),
            None => builder,
        };

        let response = builder.send().await.map_err(|e| NvrError::transport(&url, e))?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(|e| NvrError::transport(&url, e))?;

        debug!(url = %url, status, bytes = body.len(), "NVR response");

        Ok(Response { status, url: url.to_string(), content_type, body })
    }
}
