// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::credential::store::CredentialStore;
use crate::credential::AuthEvent;
use crate::error::ClientError;

/// Ends the session after an unrecoverable refresh failure.
///
/// Clears the store, announces [`AuthEvent::SessionEnded`], and produces the
/// terminal error handed to every waiter. Never retries.
pub struct FailureTerminator {
    store: Arc<CredentialStore>,
    event_tx: broadcast::Sender<AuthEvent>,
}

impl FailureTerminator {
    pub fn new(store: Arc<CredentialStore>, event_tx: broadcast::Sender<AuthEvent>) -> Self {
        Self { store, event_tx }
    }

    /// End the session the failed refresh started from.
    ///
    /// Returns `None` without touching anything when the store changed since
    /// `started_at`: that session was not the one that failed.
    pub fn terminate(&self, started_at: u64, reason: &anyhow::Error) -> Option<ClientError> {
        let reason = format!("{reason:#}");
        if !self.store.clear_if_generation(started_at) {
            tracing::debug!(err = %reason, "refresh failed for a session that was already replaced");
            return None;
        }
        tracing::warn!(err = %reason, "credential refresh failed, session cleared");
        let _ = self.event_tx.send(AuthEvent::SessionEnded { reason: reason.clone() });
        Some(ClientError::RefreshFailed { reason })
    }
}
