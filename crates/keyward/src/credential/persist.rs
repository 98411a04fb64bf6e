// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session persistence: load/save to JSON file with atomic writes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::credential::{Credential, SessionProfile};

/// On-disk form of the signed-in session.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default)]
    pub profile: SessionProfile,
}

impl PersistedSession {
    pub fn new(credential: &Credential, profile: &SessionProfile) -> Self {
        Self {
            app_key: credential.app_key.clone(),
            account_id: credential.account_id.clone(),
            profile: profile.clone(),
        }
    }

    pub fn credential(&self) -> Credential {
        Credential { app_key: self.app_key.clone(), account_id: self.account_id.clone() }
    }
}

/// Load a persisted session. A missing file is an empty session.
pub fn load(path: &Path) -> anyhow::Result<PersistedSession> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(PersistedSession::default())
        }
        Err(e) => return Err(e.into()),
    };
    let session: PersistedSession = serde_json::from_str(&contents)?;
    Ok(session)
}

/// Save a session atomically (write tmp + rename).
///
/// The temp name carries the PID and a counter so concurrent saves never
/// share a temp file.
pub fn save(path: &Path, session: &PersistedSession) -> anyhow::Result<()> {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(session)?;
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        "{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
