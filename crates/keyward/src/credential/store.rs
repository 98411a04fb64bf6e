// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide credential store shared by the dispatcher and the refresh
//! coordinator.

use std::path::PathBuf;

use parking_lot::{Mutex, RwLock};

use crate::credential::persist::{self, PersistedSession};
use crate::credential::{Credential, CredentialSnapshot, SessionProfile};

struct StoreState {
    credential: Credential,
    profile: SessionProfile,
    /// Bumped on every change to `credential`.
    generation: u64,
}

/// Holds the current credential and session profile.
///
/// Readers always see a whole credential: both fields are swapped under one
/// write lock. When opened with a path, every change is written through to
/// disk.
pub struct CredentialStore {
    state: RwLock<StoreState>,
    persist_path: Option<PathBuf>,
    /// Generation of the last session written to disk. Serializes writers
    /// without blocking readers.
    written: Mutex<u64>,
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore {
    /// An empty, in-memory store.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState {
                credential: Credential::empty(),
                profile: SessionProfile::default(),
                generation: 0,
            }),
            persist_path: None,
            written: Mutex::new(0),
        }
    }

    /// A store backed by a JSON file, seeded from it if present.
    ///
    /// An unreadable file is logged and treated as no session.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let session = match persist::load(&path) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(path = %path.display(), err = %e, "ignoring unreadable credential file");
                PersistedSession::default()
            }
        };
        if session.account_id.is_some() {
            tracing::debug!(path = %path.display(), "loaded persisted session");
        }
        Self {
            state: RwLock::new(StoreState {
                credential: session.credential(),
                profile: session.profile,
                generation: 0,
            }),
            persist_path: Some(path),
            written: Mutex::new(0),
        }
    }

    /// Current credential.
    pub fn get(&self) -> Credential {
        self.state.read().credential.clone()
    }

    /// Current credential and the generation it belongs to.
    pub fn snapshot(&self) -> CredentialSnapshot {
        let state = self.state.read();
        CredentialSnapshot { credential: state.credential.clone(), generation: state.generation }
    }

    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    pub fn profile(&self) -> SessionProfile {
        self.state.read().profile.clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.state.read().credential.is_complete()
    }

    /// Replace the credential, keeping the session profile.
    pub fn set(&self, credential: Credential) {
        if !credential.is_complete() && !credential.is_empty() {
            tracing::debug!("storing partial credential");
        }
        let written = {
            let mut state = self.state.write();
            state.credential = credential;
            state.generation += 1;
            Self::to_persist(&state)
        };
        self.persist(written);
    }

    /// Replace the credential only if the store is still at `expected`.
    ///
    /// Returns `false`, leaving the store untouched, when anything changed it
    /// since `expected` was read.
    pub fn set_if_generation(&self, expected: u64, credential: Credential) -> bool {
        let written = {
            let mut state = self.state.write();
            if state.generation != expected {
                return false;
            }
            state.credential = credential;
            state.generation += 1;
            Self::to_persist(&state)
        };
        self.persist(written);
        true
    }

    /// Replace both the credential and the session profile.
    pub fn sign_in(&self, credential: Credential, profile: SessionProfile) {
        let written = {
            let mut state = self.state.write();
            state.credential = credential;
            state.profile = profile;
            state.generation += 1;
            Self::to_persist(&state)
        };
        self.persist(written);
    }

    /// Reset to the empty session. Idempotent.
    pub fn clear(&self) {
        self.clear_where(|_| true);
    }

    /// Reset to the empty session only if the store is still at `expected`.
    ///
    /// Returns `false`, leaving the store untouched, when anything changed it
    /// since `expected` was read.
    pub fn clear_if_generation(&self, expected: u64) -> bool {
        self.clear_where(|generation| generation == expected)
    }

    fn clear_where(&self, allowed: impl FnOnce(u64) -> bool) -> bool {
        let written = {
            let mut state = self.state.write();
            if !allowed(state.generation) {
                return false;
            }
            if state.credential.is_empty() && state.profile == SessionProfile::default() {
                return true;
            }
            state.credential = Credential::empty();
            state.profile = SessionProfile::default();
            state.generation += 1;
            Self::to_persist(&state)
        };
        self.persist(written);
        true
    }

    fn to_persist(state: &StoreState) -> (u64, PersistedSession) {
        (state.generation, PersistedSession::new(&state.credential, &state.profile))
    }

    /// Write a session to disk outside the state lock. A write older than
    /// the last one on disk is dropped.
    fn persist(&self, (generation, session): (u64, PersistedSession)) {
        let Some(ref path) = self.persist_path else {
            return;
        };
        let mut written = self.written.lock();
        if generation <= *written {
            return;
        }
        match persist::save(path, &session) {
            Ok(()) => *written = generation,
            Err(e) => {
                tracing::warn!(path = %path.display(), err = %e, "failed to persist credentials")
            }
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
