//! `ecolesync run`: a session driven by line-oriented stdin events.

use anyhow::{Context, Result};
use ecolesync::connectivity::parse_state;
use ecolesync::session::SyncSession;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::app::status::{render_dispatch, render_report, render_session_status};
use ecolesync::config::Config;

#[derive(Debug, Clone, PartialEq)]
pub enum RunInput {
    Connectivity(bool),
    Retry,
    Status,
    Send {
        name: String,
        payload: serde_json::Value,
    },
    Quit,
}

impl RunInput {
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        if let Some(online) = parse_state(line) {
            return Ok(Some(Self::Connectivity(online)));
        }

        let (head, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let input = match head.to_ascii_lowercase().as_str() {
            "retry" => Self::Retry,
            "status" => Self::Status,
            "quit" | "exit" => Self::Quit,
            "send" => {
                let rest = rest.trim_start();
                let (name, payload) = rest
                    .split_once(char::is_whitespace)
                    .unwrap_or((rest, "{}"));
                if name.is_empty() {
                    anyhow::bail!("usage: send <name> <json>");
                }
                let payload = serde_json::from_str(payload.trim())
                    .with_context(|| format!("invalid JSON payload for {name}"))?;
                Self::Send {
                    name: name.to_string(),
                    payload,
                }
            }
            other => anyhow::bail!("unknown input {other:?}"),
        };
        Ok(Some(input))
    }
}

pub async fn run(config: &Config, session: SyncSession) -> Result<()> {
    let _reports = session
        .trigger()
        .on_report(|report| println!("{}", render_report(report)));
    let _changes = session.observer().subscribe(|change| {
        tracing::debug!(length = change.length(), ?change, "Queue changed");
    });

    println!("{}", render_session_status(config, &session));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let input = match RunInput::parse(&line) {
            Ok(Some(input)) => input,
            Ok(None) => continue,
            Err(error) => {
                eprintln!("{error:#}");
                continue;
            }
        };

        match input {
            RunInput::Connectivity(online) => {
                if session.monitor().report(online)
                    && let Some(text) = session.banner().render_styled()
                {
                    println!("{text}");
                }
            }
            RunInput::Retry => session.retry_now(),
            RunInput::Status => {
                println!("{}", render_session_status(config, &session));
            }
            RunInput::Send { name, payload } => {
                let result = session.attempt(&name, payload).await;
                println!("{}", render_dispatch(&name, &result));
            }
            RunInput::Quit => break,
        }
    }

    session.dispose().await;
    Ok(())
}
