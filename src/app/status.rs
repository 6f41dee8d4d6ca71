use ecolesync::command::Command;
use ecolesync::config::Config;
use ecolesync::enqueuer::Dispatch;
use ecolesync::error::DispatchError;
use ecolesync::processor::{DrainReport, HaltReason};
use ecolesync::session::SyncSession;
use ecolesync::ui::SyncBanner;
use ecolesync::ui::style as ui;
use ecolesync::utils::text::{single_line, truncate_with_ellipsis};

const ERROR_PREVIEW_CHARS: usize = 80;

/// `degraded` means no platform signal was seen and the state is a guess.
pub fn render_status(
    config: &Config,
    principal: &str,
    banner: &SyncBanner,
    degraded: bool,
) -> String {
    let mut connectivity = if banner.is_online() {
        ui::success("online")
    } else {
        ui::pending("offline")
    };
    if degraded {
        connectivity = format!("{connectivity} {}", ui::dim("(assumed, no platform signal)"));
    }

    let mut lines = vec![
        format!("◆ {}", ui::header("ecolesync status")),
        String::new(),
        format!("{}     {}", ui::label("Version"), env!("CARGO_PKG_VERSION")),
        format!("{}   {}", ui::label("Principal"), ui::value(principal)),
        format!("{}    {}", ui::label("Endpoint"), config.rpc.endpoint),
        format!(
            "{}      {}",
            ui::label("Config"),
            config.config_path.display()
        ),
        format!(
            "{}       {}",
            ui::label("Queue"),
            config.db_path().display()
        ),
        String::new(),
        format!("{} {connectivity}", ui::label("Connectivity")),
        format!("{}     {}", ui::label("Pending"), banner.pending()),
        format!(
            "{}   {}",
            ui::label("Queueable"),
            if config.queueable.is_empty() {
                ui::dim("(none)")
            } else {
                config
                    .queueable
                    .iter()
                    .map(|entry| entry.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            }
        ),
    ];

    if let Some(text) = banner.render_styled() {
        lines.push(String::new());
        lines.push(text);
    }

    lines.join("\n")
}

pub fn render_session_status(config: &Config, session: &SyncSession) -> String {
    render_status(
        config,
        session.principal(),
        &session.banner(),
        session.monitor().is_degraded(),
    )
}

pub fn render_pending(commands: &[Command]) -> String {
    if commands.is_empty() {
        return ui::dim("No pending commands.");
    }

    let mut lines = vec![ui::header(format!("{} pending", commands.len()))];
    for (index, command) in commands.iter().enumerate() {
        lines.push(format!(
            "{:>3}. {}  {}  {}  attempts={}",
            index + 1,
            ui::value(&command.id),
            command.name,
            ui::dim(command.enqueued_at.format("%Y-%m-%d %H:%M:%S")),
            command.attempts
        ));
        if let Some(error) = &command.last_error {
            lines.push(format!(
                "     {}",
                ui::dim(truncate_with_ellipsis(&single_line(error), ERROR_PREVIEW_CHARS))
            ));
        }
    }
    lines.join("\n")
}

pub fn render_dispatch(name: &str, result: &Result<Dispatch, DispatchError>) -> String {
    match result {
        Ok(Dispatch::Delivered(value)) => {
            format!("{} {name}: {value}", ui::success("✓ delivered"))
        }
        Ok(Dispatch::Queued(receipt)) => {
            let durability = if receipt.durable {
                "will be sent when the connection returns"
            } else {
                "held in memory only; lost if the app closes"
            };
            format!(
                "{} {name} as {} ({durability})",
                ui::pending("⧗ queued"),
                ui::value(&receipt.id)
            )
        }
        Err(error) => format!("{} {name}: {error}", ui::failure("✗ failed")),
    }
}

pub fn render_report(report: &DrainReport) -> String {
    let summary = format!(
        "replayed {}, rejected {}, remaining {}",
        report.processed, report.failed, report.remaining
    );
    match &report.halted {
        None => format!("{} {summary}", ui::success("✓ drain complete:")),
        Some(reason) => format!(
            "{} {summary} ({})",
            ui::pending("⧗ drain halted:"),
            describe_halt(reason)
        ),
    }
}

fn describe_halt(reason: &HaltReason) -> String {
    match reason {
        HaltReason::Transport {
            command_id,
            message,
        } => format!("server unreachable at {command_id}: {message}"),
        HaltReason::Unauthorized {
            command_id,
            message,
        } => format!("credential refused at {command_id}: {message}; sign in again"),
        HaltReason::CredentialUnavailable { message } => {
            format!("no credential: {message}")
        }
    }
}
