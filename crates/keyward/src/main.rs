// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use reqwest::Method;
use tracing::error;

use keyward::config::{Cli, Command};
use keyward::{ApiClient, ApiRequest, Credential, SessionProfile};

/// Exit code when the stored session has ended and a new sign-in is needed.
const EXIT_SESSION_ENDED: i32 = 3;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = cli.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    init_tracing(&cli);

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("fatal: {e:#}");
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing(cli: &Cli) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    match cli.log_format.as_str() {
        "json" => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).json().init();
        }
        _ => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let client = ApiClient::from_config(&cli.client)?;

    match cli.command {
        Command::SignIn { app_key, account_id, phone, platform } => {
            client.sign_in(Credential::new(app_key, account_id), SessionProfile { phone, platform });
            println!("signed in");
            Ok(0)
        }
        Command::SignOut => {
            client.sign_out();
            println!("signed out");
            Ok(0)
        }
        Command::Status => {
            let credential = client.credential();
            let profile = client.store().profile();
            let status = serde_json::json!({
                "signed_in": client.is_signed_in(),
                "account_id": credential.account_id,
                "app_key": credential.app_key.as_deref().map(redact),
                "phone": profile.phone,
                "platform": profile.platform,
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(0)
        }
        Command::Request { method, path, query, data } => {
            let method = Method::from_bytes(method.to_uppercase().as_bytes())
                .map_err(|_| anyhow::anyhow!("invalid method: {method}"))?;
            let mut request = ApiRequest::new(method, path);
            for pair in &query {
                if let Some((k, v)) = pair.split_once('=') {
                    request = request.query(k, v);
                }
            }
            if let Some(ref data) = data {
                request = request.json(serde_json::from_str(data)?);
            }

            match client.send(request).await {
                Ok(resp) => {
                    eprintln!("HTTP {}", resp.status());
                    println!("{}", resp.text());
                    Ok(if resp.is_success() { 0 } else { 1 })
                }
                Err(e) if e.is_terminal() => {
                    eprintln!("session ended: {e}");
                    Ok(EXIT_SESSION_ENDED)
                }
                Err(e) => Err(e.into()),
            }
        }
    }
}

/// Show only the last four characters of a secret.
fn redact(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "****".to_owned();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{tail}")
}
