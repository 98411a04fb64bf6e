// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential state: the app key / account id pair, the session profile
//! used when refreshing, and the events emitted as a session starts and ends.

pub mod persist;
pub mod store;

use serde::{Deserialize, Serialize};

/// The pair of values that authenticates a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub app_key: Option<String>,
    pub account_id: Option<String>,
}

impl Credential {
    pub fn new(app_key: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self { app_key: Some(app_key.into()), account_id: Some(account_id.into()) }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Both fields are present.
    pub fn is_complete(&self) -> bool {
        self.app_key.is_some() && self.account_id.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.app_key.is_none() && self.account_id.is_none()
    }
}

/// Side-channel identity sent along with refresh calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}

/// A credential together with the store generation it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialSnapshot {
    pub credential: Credential,
    pub generation: u64,
}

/// Session lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuthEvent {
    /// A session was established by sign-in.
    SignedIn { account_id: Option<String> },
    /// Credentials were rotated by a refresh.
    Refreshed { account_id: Option<String> },
    /// Refresh failed and stored credentials were cleared.
    #[serde(rename = "session:ended")]
    SessionEnded { reason: String },
    /// The session was cleared by an explicit sign-out.
    SignedOut,
}
