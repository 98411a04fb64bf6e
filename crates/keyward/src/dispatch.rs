// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request dispatch: one HTTP call with credentials read at send time.

use std::sync::Arc;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::config::ClientConfig;
use crate::credential::store::CredentialStore;
use crate::credential::Credential;
use crate::error::ClientError;

/// A logical request as issued by a caller.
///
/// Survives across the original attempt and at most one retry, so it keeps
/// whether it has already been retried.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Option<serde_json::Value>,
    retried: bool,
    refresh: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
            retried: false,
            refresh: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Treat an authentication failure on this request as final instead of
    /// refreshing. For sign-in style endpoints.
    pub fn no_refresh(mut self) -> Self {
        self.refresh = false;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn is_retried(&self) -> bool {
        self.retried
    }

    pub fn refresh_enabled(&self) -> bool {
        self.refresh
    }

    pub(crate) fn mark_retried(&mut self) {
        self.retried = true;
    }
}

/// A fully read HTTP response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl ApiResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self { status, headers, body }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON. An empty body decodes as `null`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        if self.body.is_empty() {
            return Ok(serde_json::from_value(serde_json::Value::Null)?);
        }
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// A response plus the credential generation the request was sent with.
#[derive(Debug)]
pub struct Dispatched {
    pub response: ApiResponse,
    pub generation: u64,
}

/// Sends requests with the store's current credential merged into the
/// headers.
pub struct Dispatcher {
    http: reqwest::Client,
    base_url: String,
    store: Arc<CredentialStore>,
    fallback_app_key: Option<String>,
    app_key_header: HeaderName,
    account_header: HeaderName,
}

impl Dispatcher {
    pub fn new(config: &ClientConfig, store: Arc<CredentialStore>) -> anyhow::Result<Self> {
        crate::ensure_crypto();
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .cookie_store(true)
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            store,
            fallback_app_key: config.fallback_app_key.clone(),
            app_key_header: HeaderName::try_from(config.app_key_header.as_str())?,
            account_header: HeaderName::try_from(config.account_header.as_str())?,
        })
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// Resolve a path and query against the base URL.
    pub fn url(&self, path: &str, query: &[(String, String)]) -> Result<Url, ClientError> {
        let raw = if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        };
        let mut url =
            Url::parse(&raw).map_err(|e| ClientError::InvalidRequest(format!("{raw}: {e}")))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    /// Write `credential` into `headers`, replacing whatever was there.
    ///
    /// Falls back to the configured app key when none is stored. The account
    /// header is removed when no account is stored.
    pub fn apply_credentials(
        &self,
        credential: &Credential,
        headers: &mut HeaderMap,
    ) -> Result<(), ClientError> {
        match credential.app_key.as_deref().or(self.fallback_app_key.as_deref()) {
            Some(key) => {
                headers.insert(self.app_key_header.clone(), header_value(key, "app key")?);
            }
            None => {
                headers.remove(&self.app_key_header);
            }
        }
        match credential.account_id.as_deref() {
            Some(account) => {
                headers.insert(self.account_header.clone(), header_value(account, "account id")?);
            }
            None => {
                headers.remove(&self.account_header);
            }
        }
        Ok(())
    }

    /// Send one request. Transport failures are returned as-is; every HTTP
    /// status, including auth failures, comes back as a response.
    pub async fn dispatch(&self, request: &ApiRequest) -> Result<Dispatched, ClientError> {
        let url = self.url(&request.path, &request.query)?;
        let snapshot = self.store.snapshot();
        let mut headers = request.headers.clone();
        self.apply_credentials(&snapshot.credential, &mut headers)?;

        let mut builder = self.http.request(request.method.clone(), url).headers(headers);
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let resp = match builder.send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(method = %request.method, path = %request.path, err = %e, "transport error");
                return Err(e.into());
            }
        };
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes().await?;
        tracing::debug!(
            method = %request.method,
            path = %request.path,
            status = status.as_u16(),
            generation = snapshot.generation,
            retried = request.retried,
            "request completed"
        );

        Ok(Dispatched {
            response: ApiResponse::new(status, headers, body),
            generation: snapshot.generation,
        })
    }
}

fn header_value(value: &str, what: &str) -> Result<HeaderValue, ClientError> {
    let mut value = HeaderValue::from_str(value)
        .map_err(|_| ClientError::InvalidRequest(format!("{what} is not a valid header value")))?;
    value.set_sensitive(true);
    Ok(value)
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
