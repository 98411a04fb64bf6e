// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-flight refresh coordination.
//!
//! The coordinator is either `Idle` or `Refreshing` with a list of waiters.
//! The first request to hit an auth failure while idle starts the one
//! refresh and becomes its first waiter; every request that fails while the
//! refresh is running attaches to the same list. When the refresh settles the
//! state returns to `Idle` and every waiter gets the same outcome.
//!
//! Deciding between "start" and "attach" happens under a synchronous lock
//! that is never held across an `.await`.
//!
//! A refreshed credential is only stored if nothing changed the store while
//! the refresh ran. A sign-out in that window wins over the refresh.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::StatusCode;
use tokio::sync::{broadcast, oneshot};

use crate::config::ClientConfig;
use crate::credential::store::CredentialStore;
use crate::credential::{AuthEvent, Credential, CredentialSnapshot};
use crate::error::ClientError;
use crate::refresh::terminator::FailureTerminator;
use crate::refresh::{RefreshRequest, Refresher};

/// Outcome delivered to each waiter. `Ok` means a fresh credential is in the
/// store and the request may be retried.
type Outcome = Result<(), ClientError>;

enum RefreshState {
    Idle,
    Refreshing { waiters: Vec<oneshot::Sender<Outcome>> },
}

/// Observable coordinator phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPhase {
    Idle,
    Refreshing,
}

pub struct RefreshCoordinator<R> {
    store: Arc<CredentialStore>,
    refresher: Arc<R>,
    terminator: FailureTerminator,
    event_tx: broadcast::Sender<AuthEvent>,
    state: Mutex<RefreshState>,
    /// Store generation left behind by the last failed refresh, and the error
    /// its waiters got. Only touched with `state` held.
    last_failure: Mutex<Option<(u64, ClientError)>>,
    auth_failure_statuses: Vec<StatusCode>,
    refresh_timeout: Duration,
    refreshes: AtomicU64,
}

impl<R: Refresher> RefreshCoordinator<R> {
    pub fn new(
        config: &ClientConfig,
        store: Arc<CredentialStore>,
        refresher: Arc<R>,
        event_tx: broadcast::Sender<AuthEvent>,
    ) -> Arc<Self> {
        let auth_failure_statuses = config
            .auth_failure_statuses
            .iter()
            .filter_map(|&code| StatusCode::from_u16(code).ok())
            .collect();
        Arc::new(Self {
            terminator: FailureTerminator::new(Arc::clone(&store), event_tx.clone()),
            store,
            refresher,
            event_tx,
            state: Mutex::new(RefreshState::Idle),
            last_failure: Mutex::new(None),
            auth_failure_statuses,
            refresh_timeout: config.refresh_timeout(),
            refreshes: AtomicU64::new(0),
        })
    }

    /// Whether `status` means the credential was rejected.
    pub fn is_auth_failure(&self, status: StatusCode) -> bool {
        self.auth_failure_statuses.contains(&status)
    }

    pub fn phase(&self) -> RefreshPhase {
        match *self.state.lock() {
            RefreshState::Idle => RefreshPhase::Idle,
            RefreshState::Refreshing { .. } => RefreshPhase::Refreshing,
        }
    }

    /// Number of requests attached to the in-flight refresh.
    pub fn waiter_count(&self) -> usize {
        match *self.state.lock() {
            RefreshState::Idle => 0,
            RefreshState::Refreshing { ref waiters } => waiters.len(),
        }
    }

    /// Number of refreshes started so far.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Wait until the credential a request was sent with (`sent_generation`)
    /// has been replaced, starting a refresh if none is running.
    ///
    /// Returns immediately if the store already moved past `sent_generation`:
    /// `Ok` when it holds a complete credential, and the ended-session error
    /// when the session was cleared in the meantime.
    pub async fn await_refresh(self: &Arc<Self>, sent_generation: u64) -> Result<(), ClientError> {
        let rx = {
            let mut state = self.state.lock();

            let current = self.store.snapshot();
            if current.generation > sent_generation && current.credential.is_complete() {
                tracing::debug!(
                    sent_generation,
                    generation = current.generation,
                    "credential already rotated, skipping refresh"
                );
                return Ok(());
            }

            let (tx, rx) = oneshot::channel();
            match &mut *state {
                RefreshState::Refreshing { waiters } => {
                    waiters.push(tx);
                    tracing::debug!(waiters = waiters.len(), "attached to in-flight refresh");
                }
                RefreshState::Idle => {
                    if current.generation > sent_generation && current.credential.is_empty() {
                        let err = self.ended_error(current.generation);
                        tracing::debug!(sent_generation, err = %err, "session already ended");
                        return Err(err);
                    }
                    *state = RefreshState::Refreshing { waiters: vec![tx] };
                    self.refreshes.fetch_add(1, Ordering::SeqCst);
                    let this = Arc::clone(self);
                    tokio::spawn(async move { this.run_refresh(current).await });
                }
            }
            rx
        };

        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(ClientError::RefreshFailed {
                reason: "refresh task ended without a result".to_owned(),
            }),
        }
    }

    /// Error for a request whose session is already gone. Matches what the
    /// waiters of the refresh that ended it were told.
    fn ended_error(&self, generation: u64) -> ClientError {
        match *self.last_failure.lock() {
            Some((failed_at, ref err)) if failed_at == generation => err.clone(),
            _ => ClientError::RefreshFailed { reason: "signed out".to_owned() },
        }
    }

    /// Run the refresh from the `started` credential to completion, then
    /// settle every waiter.
    ///
    /// Runs on its own task so the waiters are settled even if the request
    /// that started it is dropped.
    async fn run_refresh(self: Arc<Self>, started: CredentialSnapshot) {
        let mut reset = ResetOnDrop { state: &self.state, armed: true };

        let outcome = match self.perform_refresh(&started).await {
            Ok(credential) => self.apply(started.generation, credential),
            Err(e) => match self.terminator.terminate(started.generation, &e) {
                Some(err) => Err(err),
                None => self.superseded(),
            },
        };

        let waiters = {
            let mut state = self.state.lock();
            reset.armed = false;
            if let Err(ref err) = outcome {
                *self.last_failure.lock() = Some((self.store.generation(), err.clone()));
            }
            match std::mem::replace(&mut *state, RefreshState::Idle) {
                RefreshState::Refreshing { waiters } => waiters,
                RefreshState::Idle => Vec::new(),
            }
        };

        tracing::debug!(waiters = waiters.len(), ok = outcome.is_ok(), "refresh settled");
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }

    /// Store a refreshed credential unless the session changed since
    /// `started_at`.
    fn apply(&self, started_at: u64, credential: Credential) -> Result<(), ClientError> {
        let account_id = credential.account_id.clone();
        if !self.store.set_if_generation(started_at, credential) {
            return self.superseded();
        }
        tracing::info!(account = account_id.as_deref().unwrap_or(""), "credentials refreshed");
        let _ = self.event_tx.send(AuthEvent::Refreshed { account_id });
        Ok(())
    }

    /// Outcome for waiters when the session changed while the refresh ran.
    ///
    /// After a sign-in the new session is kept and waiters retry with it.
    /// After a sign-out they fail without ending anything.
    fn superseded(&self) -> Result<(), ClientError> {
        if self.store.is_signed_in() {
            tracing::info!("session replaced during refresh, discarding refresh result");
            Ok(())
        } else {
            tracing::info!("signed out during refresh, discarding refresh result");
            Err(ClientError::RefreshFailed { reason: "signed out during refresh".to_owned() })
        }
    }

    async fn perform_refresh(&self, started: &CredentialSnapshot) -> anyhow::Result<Credential> {
        let credential = started.credential.clone();
        let profile = self.store.profile();
        let account_id = credential
            .account_id
            .ok_or_else(|| anyhow::anyhow!("no stored account identifier to refresh"))?;
        let request = RefreshRequest {
            account_id,
            phone: profile.phone,
            platform: profile.platform,
            app_key: credential.app_key,
        };

        tracing::info!(account = %request.account_id, "refreshing credentials");
        let refreshed =
            match tokio::time::timeout(self.refresh_timeout, self.refresher.refresh(request)).await
            {
                Ok(result) => result?,
                Err(_) => anyhow::bail!("refresh timed out after {:?}", self.refresh_timeout),
            };
        if !refreshed.is_complete() {
            anyhow::bail!("refresh returned an incomplete credential");
        }
        Ok(refreshed)
    }
}

/// Returns the coordinator to `Idle` if the refresh task unwinds before
/// settling. Dropping the waiters' senders wakes them with an error.
struct ResetOnDrop<'a> {
    state: &'a Mutex<RefreshState>,
    armed: bool,
}

impl Drop for ResetOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::error!("refresh task ended before settling, resetting coordinator");
            *self.state.lock() = RefreshState::Idle;
        }
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
