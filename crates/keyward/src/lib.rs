// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Keyward: an API client that injects the stored app key / account id into
//! every request and refreshes expired credentials once for all concurrent
//! callers.

pub mod client;
pub mod config;
pub mod credential;
pub mod dispatch;
pub mod error;
pub mod refresh;

#[cfg(test)]
mod test_support;

use std::sync::Once;

pub use crate::client::ApiClient;
pub use crate::config::ClientConfig;
pub use crate::credential::store::CredentialStore;
pub use crate::credential::{AuthEvent, Credential, SessionProfile};
pub use crate::dispatch::{ApiRequest, ApiResponse};
pub use crate::error::ClientError;
pub use crate::refresh::{RefreshRequest, Refresher};

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
/// Safe to call multiple times; only the first call has effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
