// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Refresh over HTTP, with optional retries.

use std::time::Duration;

use reqwest::header::HeaderName;
use serde::Deserialize;

use crate::config::ClientConfig;
use crate::credential::Credential;
use crate::refresh::{RefreshRequest, Refresher};

const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Body returned by the refresh endpoint.
#[derive(Debug, Deserialize)]
pub struct RefreshResponse {
    pub app_key: String,
    #[serde(default)]
    pub account_id: Option<String>,
}

/// Calls `POST {base_url}{refresh_path}` with the stored account id and
/// session profile.
pub struct HttpRefresher {
    http: reqwest::Client,
    url: String,
    app_key_header: HeaderName,
    max_retries: u32,
    initial_backoff: Duration,
}

impl HttpRefresher {
    pub fn new(config: &ClientConfig) -> anyhow::Result<Self> {
        crate::ensure_crypto();
        let http = reqwest::Client::builder()
            .timeout(config.refresh_timeout())
            .cookie_store(true)
            .build()?;
        Ok(Self {
            http,
            url: format!("{}{}", config.base_url.trim_end_matches('/'), config.refresh_path),
            app_key_header: HeaderName::try_from(config.app_key_header.as_str())?,
            max_retries: config.refresh_retries,
            initial_backoff: Duration::from_millis(200),
        })
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// One call to the refresh endpoint.
    async fn attempt(&self, request: &RefreshRequest) -> Result<Credential, Attempt> {
        let mut req = self.http.post(&self.url).json(request);
        if let Some(ref key) = request.app_key {
            req = req.header(self.app_key_header.clone(), key.as_str());
        }
        let resp = req.send().await.map_err(|e| Attempt::Retry(e.into()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let err = anyhow::anyhow!("refresh failed ({status}): {text}");
            // 4xx means the server refused this session; asking again won't help.
            return Err(if status.is_client_error() {
                Attempt::Fatal(err)
            } else {
                Attempt::Retry(err)
            });
        }

        let body: RefreshResponse = resp.json().await.map_err(|e| Attempt::Fatal(e.into()))?;
        let account_id = body.account_id.unwrap_or_else(|| request.account_id.clone());
        Ok(Credential::new(body.app_key, account_id))
    }
}

/// Failed attempt, split by whether another one may succeed.
enum Attempt {
    Retry(anyhow::Error),
    Fatal(anyhow::Error),
}

impl Refresher for HttpRefresher {
    /// Refresh, retrying transport errors and 5xx answers up to
    /// `refresh_retries` times with doubling backoff.
    async fn refresh(&self, request: RefreshRequest) -> anyhow::Result<Credential> {
        let mut backoff = self.initial_backoff;
        let mut retries_left = self.max_retries;
        loop {
            let err = match self.attempt(&request).await {
                Ok(credential) => return Ok(credential),
                Err(Attempt::Fatal(e)) => return Err(e),
                Err(Attempt::Retry(e)) if retries_left == 0 => return Err(e),
                Err(Attempt::Retry(e)) => e,
            };
            retries_left -= 1;
            tracing::debug!(retries_left, err = %err, ?backoff, "refresh attempt failed, retrying");
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
