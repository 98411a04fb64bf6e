// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The authenticated API client callers talk to.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::config::ClientConfig;
use crate::credential::store::CredentialStore;
use crate::credential::{AuthEvent, Credential, SessionProfile};
use crate::dispatch::{ApiRequest, ApiResponse, Dispatcher};
use crate::error::ClientError;
use crate::refresh::coordinator::{RefreshCoordinator, RefreshPhase};
use crate::refresh::http::HttpRefresher;
use crate::refresh::Refresher;

/// API client that attaches the stored credential to every request and
/// recovers from expired credentials with a shared, single refresh.
pub struct ApiClient<R = HttpRefresher> {
    dispatcher: Dispatcher,
    coordinator: Arc<RefreshCoordinator<R>>,
    store: Arc<CredentialStore>,
    event_tx: broadcast::Sender<AuthEvent>,
}

impl ApiClient<HttpRefresher> {
    /// Client refreshing through the HTTP refresh endpoint named in `config`.
    ///
    /// Uses a file-backed store when `config.credential_file` is set.
    pub fn from_config(config: &ClientConfig) -> anyhow::Result<Self> {
        let store = match config.credential_file {
            Some(ref path) => CredentialStore::open(path),
            None => CredentialStore::new(),
        };
        let refresher = HttpRefresher::new(config)?;
        Self::with_store(config, Arc::new(store), Arc::new(refresher))
    }
}

impl<R: Refresher> ApiClient<R> {
    /// Client with an empty in-memory store.
    pub fn new(config: &ClientConfig, refresher: Arc<R>) -> anyhow::Result<Self> {
        Self::with_store(config, Arc::new(CredentialStore::new()), refresher)
    }

    pub fn with_store(
        config: &ClientConfig,
        store: Arc<CredentialStore>,
        refresher: Arc<R>,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let (event_tx, _) = broadcast::channel(64);
        let dispatcher = Dispatcher::new(config, Arc::clone(&store))?;
        let coordinator =
            RefreshCoordinator::new(config, Arc::clone(&store), refresher, event_tx.clone());
        Ok(Self { dispatcher, coordinator, store, event_tx })
    }

    /// Send a request. On an auth failure the credential is refreshed (once
    /// for all concurrent failures) and the request is retried once.
    pub async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse, ClientError> {
        loop {
            let sent = self.dispatcher.dispatch(&request).await?;
            let status = sent.response.status();
            if !self.coordinator.is_auth_failure(status) {
                return Ok(sent.response);
            }

            if !request.refresh_enabled() {
                return Err(ClientError::AuthenticationExpired { status });
            }

            if request.is_retried() {
                tracing::error!(
                    method = %request.method(),
                    path = %request.path(),
                    status = status.as_u16(),
                    "authentication failed again after refresh"
                );
                return Err(ClientError::RetryLoopDetected {
                    method: request.method().clone(),
                    path: request.path().to_owned(),
                });
            }
            request.mark_retried();

            tracing::debug!(
                method = %request.method(),
                path = %request.path(),
                generation = sent.generation,
                "credentials rejected, waiting for refresh"
            );
            self.coordinator.await_refresh(sent.generation).await?;
        }
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse, ClientError> {
        self.send(ApiRequest::get(path)).await
    }

    pub async fn post(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<ApiResponse, ClientError> {
        self.send(ApiRequest::post(path).json(body)).await
    }

    pub async fn put(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<ApiResponse, ClientError> {
        self.send(ApiRequest::put(path).json(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, ClientError> {
        self.send(ApiRequest::delete(path)).await
    }

    /// Store a freshly signed-in session.
    pub fn sign_in(&self, credential: Credential, profile: SessionProfile) {
        let account_id = credential.account_id.clone();
        self.store.sign_in(credential, profile);
        tracing::info!(account = account_id.as_deref().unwrap_or(""), "signed in");
        let _ = self.event_tx.send(AuthEvent::SignedIn { account_id });
    }

    /// Forget the stored session.
    pub fn sign_out(&self) {
        self.store.clear();
        tracing::info!("signed out");
        let _ = self.event_tx.send(AuthEvent::SignedOut);
    }

    pub fn credential(&self) -> Credential {
        self.store.get()
    }

    pub fn is_signed_in(&self) -> bool {
        self.store.is_signed_in()
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// Subscribe to session lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.event_tx.subscribe()
    }

    pub fn refresh_phase(&self) -> RefreshPhase {
        self.coordinator.phase()
    }

    /// Number of refreshes started by this client.
    pub fn refresh_count(&self) -> u64 {
        self.coordinator.refresh_count()
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
