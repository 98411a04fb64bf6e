// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for unit tests: mock API servers and scripted refreshers.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use parking_lot::Mutex;
use tokio::net::TcpListener;

use crate::config::ClientConfig;
use crate::credential::Credential;
use crate::refresh::{RefreshRequest, Refresher};

/// Serve `app` on an ephemeral localhost port.
pub async fn spawn_server(app: Router) -> anyhow::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    Ok(addr)
}

/// Client config pointing at a mock server.
pub fn config_for(addr: SocketAddr) -> ClientConfig {
    let mut config = ClientConfig::for_base_url(format!("http://{addr}"));
    config.request_timeout_ms = 5_000;
    config.refresh_timeout_ms = 2_000;
    config
}

/// A port with nothing listening on it.
pub fn closed_port_addr() -> anyhow::Result<SocketAddr> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(addr)
}

/// Refresher that replays scripted outcomes and records every call.
///
/// Each call sleeps for `delay` first so concurrent failures can pile up
/// behind the refresh. The last outcome repeats once the script runs out.
pub struct ScriptedRefresher {
    outcomes: Mutex<VecDeque<Result<Credential, String>>>,
    last: Mutex<Option<Result<Credential, String>>>,
    delay: Duration,
    calls: AtomicU32,
    requests: Mutex<Vec<RefreshRequest>>,
}

impl ScriptedRefresher {
    pub fn new(outcomes: Vec<Result<Credential, String>>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            last: Mutex::new(None),
            delay,
            calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn succeeding(credential: Credential, delay: Duration) -> Arc<Self> {
        Self::new(vec![Ok(credential)], delay)
    }

    pub fn failing(reason: &str, delay: Duration) -> Arc<Self> {
        Self::new(vec![Err(reason.to_owned())], delay)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RefreshRequest> {
        self.requests.lock().clone()
    }
}

impl Refresher for ScriptedRefresher {
    async fn refresh(&self, request: RefreshRequest) -> anyhow::Result<Credential> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request);
        tokio::time::sleep(self.delay).await;

        let next = self.outcomes.lock().pop_front();
        let outcome = match next {
            Some(o) => {
                *self.last.lock() = Some(o.clone());
                o
            }
            None => self.last.lock().clone().unwrap_or_else(|| Err("no scripted outcome".into())),
        };
        outcome.map_err(|reason| anyhow::anyhow!(reason))
    }
}

#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = err.to_string();
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}
