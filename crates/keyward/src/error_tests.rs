// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn decode_error() -> ClientError {
    match serde_json::from_str::<serde_json::Value>("{not json") {
        Err(e) => ClientError::from(e),
        Ok(_) => ClientError::InvalidRequest("unexpected parse success".into()),
    }
}

#[yare::parameterized(
    auth_expired = { ClientError::AuthenticationExpired { status: StatusCode::UNAUTHORIZED }, "AUTHENTICATION_EXPIRED", false },
    refresh_failed = { ClientError::RefreshFailed { reason: "revoked".into() }, "REFRESH_FAILED", true },
    retry_loop = { ClientError::RetryLoopDetected { method: Method::GET, path: "/orders".into() }, "RETRY_LOOP_DETECTED", true },
    invalid = { ClientError::InvalidRequest("bad header".into()), "INVALID_REQUEST", false },
    decode = { decode_error(), "DECODE", false },
)]
fn code_and_terminality(err: ClientError, code: &str, terminal: bool) {
    assert_eq!(err.code(), code);
    assert_eq!(err.is_terminal(), terminal);
}

#[test]
fn display_includes_context() {
    let err = ClientError::RetryLoopDetected { method: Method::POST, path: "/api/assets".into() };
    assert_eq!(err.to_string(), "authentication failed again after refresh: POST /api/assets");

    let err = ClientError::RefreshFailed { reason: "session revoked".into() };
    assert_eq!(err.to_string(), "credential refresh failed: session revoked");
}
