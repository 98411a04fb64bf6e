// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential refresh: the refresh collaborator, the single-flight
//! coordinator, and the terminator that ends a session when refresh fails.

pub mod coordinator;
pub mod http;
pub mod terminator;

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::credential::Credential;

/// Input to a refresh call, taken from the store when the refresh starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub account_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    /// App key in force when the refresh started.
    #[serde(skip)]
    pub app_key: Option<String>,
}

/// Obtains a fresh credential for the stored account.
pub trait Refresher: Send + Sync + 'static {
    fn refresh(
        &self,
        request: RefreshRequest,
    ) -> impl Future<Output = anyhow::Result<Credential>> + Send;
}
