// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;

use super::{Cli, ClientConfig, Command};

fn parse(args: &[&str]) -> Cli {
    Cli::parse_from(args)
}

#[test]
fn defaults_match_for_base_url() -> anyhow::Result<()> {
    let cli = parse(&["keyward", "--base-url", "http://api.test", "request", "GET", "/ping"]);
    cli.validate()?;
    let expected = ClientConfig::for_base_url("http://api.test");
    assert_eq!(cli.client.app_key_header, expected.app_key_header);
    assert_eq!(cli.client.account_header, expected.account_header);
    assert_eq!(cli.client.auth_failure_statuses, vec![401]);
    assert_eq!(cli.client.request_timeout(), expected.request_timeout());
    assert_eq!(cli.client.refresh_timeout(), expected.refresh_timeout());
    assert_eq!(cli.client.refresh_path, "/auth/refresh");
    Ok(())
}

#[test]
fn auth_failure_statuses_are_comma_separated() -> anyhow::Result<()> {
    let cli = parse(&["keyward", "--auth-failure-status", "401,419", "request", "GET", "/"]);
    cli.validate()?;
    assert_eq!(cli.client.auth_failure_statuses, vec![401, 419]);
    Ok(())
}

#[test]
fn request_command_collects_query_and_data() -> anyhow::Result<()> {
    let cli = parse(&[
        "keyward", "request", "POST", "/orders", "-q", "page=2", "-q", "size=10", "-d",
        r#"{"sku":"x"}"#,
    ]);
    cli.validate()?;
    match cli.command {
        Command::Request { method, path, query, data } => {
            assert_eq!(method, "POST");
            assert_eq!(path, "/orders");
            assert_eq!(query, vec!["page=2", "size=10"]);
            assert_eq!(data.as_deref(), Some(r#"{"sku":"x"}"#));
        }
        other => anyhow::bail!("unexpected command: {other:?}"),
    }
    Ok(())
}

#[yare::parameterized(
    bad_url           = { &["keyward", "--base-url", "not a url", "request", "GET", "/"], "invalid base URL" },
    bad_header        = { &["keyward", "--app-key-header", "bad header", "request", "GET", "/"], "invalid header name" },
    same_headers      = { &["keyward", "--account-header", "APPKEY", "request", "GET", "/"], "must differ" },
    success_status    = { &["keyward", "--auth-failure-status", "200", "request", "GET", "/"], "success status" },
    out_of_range      = { &["keyward", "--auth-failure-status", "1000", "request", "GET", "/"], "invalid auth failure status" },
    relative_refresh  = { &["keyward", "--refresh-path", "auth/refresh", "request", "GET", "/"], "must start with" },
    sign_in_no_file   = { &["keyward", "sign-in", "--app-key", "k", "--account-id", "a"], "--credential-file" },
    status_no_file    = { &["keyward", "status"], "--credential-file" },
    bad_query         = { &["keyward", "request", "GET", "/", "-q", "novalue"], "key=value" },
    bad_data          = { &["keyward", "request", "POST", "/", "-d", "{oops"], "not valid JSON" },
)]
fn invalid_cli(args: &[&str], expected_substr: &str) {
    let cli = parse(args);
    crate::assert_err_contains!(cli.validate(), expected_substr);
}
