use anyhow::{Context, Result, bail};
use ecolesync::command::{CommandId, Idempotency, with_idempotency_key};
use ecolesync::config::Config;
use ecolesync::connectivity::{ConnectivityMonitor, StaticSignal};
use ecolesync::session::SyncSession;
use tracing::info;

use crate::app::run::run;
use crate::app::status::{render_dispatch, render_pending, render_report, render_session_status};
use crate::cli::commands::{Cli, Commands, QueueCommands};

fn resolve_principal(cli: &Cli, config: &Config) -> Result<String> {
    cli.principal
        .as_deref()
        .or(config.principal.as_deref())
        .map(str::trim)
        .filter(|principal| !principal.is_empty())
        .map(ToString::to_string)
        .context("No principal: pass --principal, set ECOLESYNC_PRINCIPAL or `principal` in config")
}

/// The CLI has no platform signal; `--offline` or config decides the start state.
fn monitor_for(config: &Config, offline: bool) -> ConnectivityMonitor {
    let signal = if offline || !config.connectivity.assume_online_without_signal {
        StaticSignal::new(Some(false))
    } else {
        StaticSignal::unknown()
    };
    ConnectivityMonitor::from_signal(&signal)
}

/// Keyed commands typed at the CLI get a key if the payload has none, so the
/// first call and every replay share it.
fn stamp_idempotency_key(
    config: &Config,
    name: &str,
    payload: serde_json::Value,
) -> serde_json::Value {
    match config.queue_policy().idempotency(name) {
        Some(Idempotency::Key(field)) => with_idempotency_key(payload, field),
        _ => payload,
    }
}

/// One-shot commands drain only when asked to.
fn drains_on_startup(command: &Commands) -> bool {
    matches!(command, Commands::Run { .. })
}

pub async fn dispatch(cli: Cli, mut config: Config) -> Result<()> {
    let principal = resolve_principal(&cli, &config)?;

    config.replay.drain_on_startup &= drains_on_startup(&cli.command);

    match cli.command {
        Commands::Run { offline } => {
            let session =
                SyncSession::open(&config, &principal, monitor_for(&config, offline)).await?;
            run(&config, session).await
        }

        Commands::Send {
            name,
            payload,
            offline,
        } => {
            let payload: serde_json::Value = serde_json::from_str(&payload)
                .with_context(|| format!("Invalid JSON payload for {name}"))?;
            let payload = stamp_idempotency_key(&config, &name, payload);
            let session =
                SyncSession::open(&config, &principal, monitor_for(&config, offline)).await?;
            let result = session.attempt(&name, payload).await;
            println!("{}", render_dispatch(&name, &result));
            session.dispose().await;
            if result.is_err() {
                bail!("{name} was not delivered");
            }
            Ok(())
        }

        Commands::Queue { queue_command } => {
            let session =
                SyncSession::open(&config, &principal, monitor_for(&config, false)).await?;
            let outcome = match queue_command {
                QueueCommands::List => {
                    let pending = session.pending().await?;
                    println!("{}", render_pending(&pending));
                    Ok(())
                }
                QueueCommands::Discard { id } => {
                    let id = CommandId::from(id);
                    if session.discard(&id).await? {
                        info!(command_id = %id, "discarded");
                        println!("Discarded {id}");
                        Ok(())
                    } else {
                        Err(anyhow::anyhow!("No pending command with id {id}"))
                    }
                }
            };
            session.dispose().await;
            outcome
        }

        Commands::Drain => {
            let session =
                SyncSession::open(&config, &principal, monitor_for(&config, false)).await?;
            let report = session.drain().await?;
            if let Some(report) = &report {
                println!("{}", render_report(report));
            }
            session.dispose().await;
            Ok(())
        }

        Commands::Status => {
            let session =
                SyncSession::open(&config, &principal, monitor_for(&config, false)).await?;
            println!("{}", render_session_status(&config, &session));
            session.dispose().await;
            Ok(())
        }
    }
}
