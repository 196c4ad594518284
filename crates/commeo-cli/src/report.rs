//! Terminal and JSON output

use colored::Colorize;
use commeo_client::Gateway;
use commeo_core::{CommandOutcome, DeviceIdentity, MotionState, StatusSnapshot};
use serde::Serialize;

/// One row of the actor table
#[derive(Debug, Serialize)]
pub struct ActorReport {
    #[serde(flatten)]
    pub identity: DeviceIdentity,
    pub position: Option<u8>,
    pub target_position: Option<u8>,
    pub status: Option<StatusSnapshot>,
}

pub fn collect(gateway: &Gateway) -> Vec<ActorReport> {
    gateway
        .actors()
        .into_iter()
        .map(|identity| {
            let status = gateway.status(identity.actor_id);
            ActorReport {
                position: status.map(|s| s.position()),
                target_position: status.map(|s| s.target_position()),
                status,
                identity,
            }
        })
        .collect()
}

fn motion(status: &StatusSnapshot) -> String {
    match status.motion {
        MotionState::Still if status.is_closed() => "closed".normal().to_string(),
        MotionState::Still if status.is_fully_open() => "open".normal().to_string(),
        MotionState::Still => "still".normal().to_string(),
        MotionState::Opening => "opening".green().to_string(),
        MotionState::Closing => "closing".yellow().to_string(),
        MotionState::Reserved(code) => format!("state {}", code).red().to_string(),
    }
}

pub fn print_table(reports: &[ActorReport]) {
    if reports.is_empty() {
        println!("{}", "No active shutters found".yellow());
        return;
    }

    println!(
        "{:>5}  {:<24} {:>8}  {:>8}  {}",
        "ID".bold(),
        "LABEL".bold(),
        "ADDRESS".bold(),
        "POSITION".bold(),
        "STATE".bold()
    );
    for report in reports {
        let (position, state) = match &report.status {
            Some(status) => (format!("{}%", status.position()), motion(status)),
            None => ("-".to_string(), "unknown".dimmed().to_string()),
        };
        println!(
            "{:>5}  {:<24} {:>8X}  {:>8}  {}",
            report.identity.actor_id,
            report.identity.label,
            report.identity.radio_address,
            position,
            state
        );
    }
}

pub fn print_json(reports: &[ActorReport]) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(reports)?);
    Ok(())
}

pub fn print_status(label: &str, status: &StatusSnapshot) {
    println!(
        "{} {} {}% -> {}% ({})",
        "UPDATE".cyan(),
        label.bold(),
        status.position(),
        status.target_position(),
        motion(status)
    );
}

pub fn print_outcome(outcome: &CommandOutcome) {
    let line = outcome.to_string();
    if !outcome.has_error() {
        println!("{} {}", "OK".green().bold(), line);
    } else if outcome.succeeded.is_empty() {
        println!("{} {}", "FAILED".red().bold(), line);
    } else {
        println!("{} {}", "PARTIAL".yellow().bold(), line);
    }
}
