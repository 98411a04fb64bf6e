// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use reqwest::header::HeaderName;
use reqwest::{StatusCode, Url};

pub const DEFAULT_APP_KEY_HEADER: &str = "appKey";
pub const DEFAULT_ACCOUNT_HEADER: &str = "accountId";
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_REFRESH_TIMEOUT_MS: u64 = 15_000;

/// Configuration for the authenticated API client.
#[derive(Debug, Clone, clap::Args)]
pub struct ClientConfig {
    /// Base URL of the API server.
    #[arg(long, default_value = "http://127.0.0.1:8080", env = "KEYWARD_BASE_URL")]
    pub base_url: String,

    /// App key sent before any sign-in has happened.
    #[arg(long, env = "KEYWARD_FALLBACK_APP_KEY")]
    pub fallback_app_key: Option<String>,

    /// Header carrying the application key.
    #[arg(long, default_value = DEFAULT_APP_KEY_HEADER, env = "KEYWARD_APP_KEY_HEADER")]
    pub app_key_header: String,

    /// Header carrying the account identifier.
    #[arg(long, default_value = DEFAULT_ACCOUNT_HEADER, env = "KEYWARD_ACCOUNT_HEADER")]
    pub account_header: String,

    /// Response statuses treated as expired credentials.
    #[arg(
        long = "auth-failure-status",
        value_delimiter = ',',
        default_value = "401",
        env = "KEYWARD_AUTH_FAILURE_STATUS"
    )]
    pub auth_failure_statuses: Vec<u16>,

    /// Per-request timeout in milliseconds.
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT_MS, env = "KEYWARD_REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: u64,

    /// Upper bound on a single credential refresh, in milliseconds.
    #[arg(long, default_value_t = DEFAULT_REFRESH_TIMEOUT_MS, env = "KEYWARD_REFRESH_TIMEOUT_MS")]
    pub refresh_timeout_ms: u64,

    /// Path of the refresh endpoint, relative to the base URL.
    #[arg(long, default_value = DEFAULT_REFRESH_PATH, env = "KEYWARD_REFRESH_PATH")]
    pub refresh_path: String,

    /// Extra refresh attempts after a failed one.
    #[arg(long, default_value_t = 0, env = "KEYWARD_REFRESH_RETRIES")]
    pub refresh_retries: u32,

    /// Persist the signed-in session to this JSON file.
    #[arg(long, env = "KEYWARD_CREDENTIAL_FILE")]
    pub credential_file: Option<PathBuf>,
}

impl ClientConfig {
    /// Config with defaults for everything but the base URL.
    pub fn for_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            fallback_app_key: None,
            app_key_header: DEFAULT_APP_KEY_HEADER.to_owned(),
            account_header: DEFAULT_ACCOUNT_HEADER.to_owned(),
            auth_failure_statuses: vec![401],
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            refresh_timeout_ms: DEFAULT_REFRESH_TIMEOUT_MS,
            refresh_path: DEFAULT_REFRESH_PATH.to_owned(),
            refresh_retries: 0,
            credential_file: None,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| anyhow::anyhow!("invalid base URL {:?}: {e}", self.base_url))?;
        if url.cannot_be_a_base() {
            anyhow::bail!("base URL cannot be a base: {}", self.base_url);
        }
        for name in [&self.app_key_header, &self.account_header] {
            HeaderName::try_from(name.as_str())
                .map_err(|_| anyhow::anyhow!("invalid header name: {name:?}"))?;
        }
        if self.app_key_header.eq_ignore_ascii_case(&self.account_header) {
            anyhow::bail!("app key and account headers must differ");
        }
        if self.auth_failure_statuses.is_empty() {
            anyhow::bail!("at least one --auth-failure-status is required");
        }
        for &code in &self.auth_failure_statuses {
            let status = StatusCode::from_u16(code)
                .map_err(|_| anyhow::anyhow!("invalid auth failure status: {code}"))?;
            if status.is_success() {
                anyhow::bail!("auth failure status cannot be a success status: {code}");
            }
        }
        if !self.refresh_path.starts_with('/') {
            anyhow::bail!("refresh path must start with '/': {:?}", self.refresh_path);
        }
        Ok(())
    }
}

/// Command-line client for an appKey/accountId authenticated API.
#[derive(Debug, Parser)]
#[command(name = "keyward", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub client: ClientConfig,

    /// Log format (json or text).
    #[arg(long, env = "KEYWARD_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "KEYWARD_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store a signed-in session.
    SignIn {
        #[arg(long)]
        app_key: String,
        #[arg(long)]
        account_id: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        platform: Option<String>,
    },
    /// Forget the stored session.
    SignOut,
    /// Print the stored session.
    Status,
    /// Send one request through the client.
    Request {
        method: String,
        path: String,
        /// Query parameter as key=value (repeatable).
        #[arg(long = "query", short = 'q')]
        query: Vec<String>,
        /// JSON request body.
        #[arg(long, short = 'd')]
        data: Option<String>,
    },
}

impl Cli {
    pub fn validate(&self) -> anyhow::Result<()> {
        self.client.validate()?;
        if matches!(self.command, Command::SignIn { .. } | Command::SignOut | Command::Status)
            && self.client.credential_file.is_none()
        {
            anyhow::bail!("--credential-file is required to manage a stored session");
        }
        if let Command::Request { ref query, ref data, .. } = self.command {
            for pair in query {
                if !pair.contains('=') {
                    anyhow::bail!("query parameter must be key=value: {pair:?}");
                }
            }
            if let Some(data) = data {
                serde_json::from_str::<serde_json::Value>(data)
                    .map_err(|e| anyhow::anyhow!("--data is not valid JSON: {e}"))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
