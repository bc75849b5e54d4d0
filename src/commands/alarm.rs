//! `alarm` command: arm, cancel, inspect and test the alarm.

use anyhow::{Context, Result};
use serde_json::json;
use std::time::Duration;

use super::{AppContext, format_instant};
use crate::alarm::AlarmKind;
use crate::args::AlarmCommand;
use crate::common::constants::MAXIMUM_DIAGNOSTIC_DELAY_SECS;
use crate::common::utils::private_path;

pub async fn handle_alarm_command(ctx: &AppContext, command: AlarmCommand, json: bool) -> Result<()> {
    match command {
        AlarmCommand::Set => {
            let fire = ctx
                .scheduler
                .setup_alarm()
                .await
                .context("Failed to set the alarm")?;
            let status = ctx.scheduler.status();
            log_block_start!("Alarm set for {}", status.state.location_label);
            log_indented!("Fires daily at {}", fire.format("%H:%M"));
            log_indented!("Next: {}", format_instant(&fire));
            Ok(())
        }
        AlarmCommand::Cancel => {
            ctx.scheduler.cancel_alarm().await;
            log_block_start!("Alarm cancelled");
            Ok(())
        }
        AlarmCommand::Status => show_status(ctx, json),
        AlarmCommand::Test { delay_secs } => {
            if !(1..=MAXIMUM_DIAGNOSTIC_DELAY_SECS).contains(&delay_secs) {
                anyhow::bail!(
                    "Test delay must be between 1 and {MAXIMUM_DIAGNOSTIC_DELAY_SECS} seconds"
                );
            }
            let fire = ctx
                .scheduler
                .schedule_diagnostic(Duration::from_secs(delay_secs))
                .await
                .context("Failed to schedule the test alarm")?;
            log_block_start!("Test alarm scheduled in {delay_secs}s");
            log_indented!("Fires at {}", format_instant(&fire));
            log_indented!("Any previously armed alarm was replaced");
            Ok(())
        }
    }
}

fn show_status(ctx: &AppContext, json: bool) -> Result<()> {
    let status = ctx.scheduler.status();
    let pending = ctx.outbox.pending()?;

    if json {
        return super::print_json(&json!({
            "phase": status.phase.as_str(),
            "alarm": status.state,
            "pending_notification": pending,
            "alarm_timing": ctx.registry.alarm_timing().as_str(),
            "selected_location": ctx.registry.selected().map(|location| location.name),
        }));
    }

    log_block_start!("Alarm: {}", status.phase.as_str());
    if let Some(fire) = status.state.fire_instant {
        let kind = match status.state.kind {
            AlarmKind::Sunrise => "sunrise",
            AlarmKind::Diagnostic => "test",
        };
        log_indented!("Location: {}", status.state.location_label);
        log_indented!("Fires: {} ({kind})", format_instant(&fire));
        if let Some(timing) = status.state.timing {
            log_indented!("Timing: {}", timing.label());
        }
    }

    match ctx.registry.selected() {
        Some(location) => log_decorated!("Selected location: {}", location.name),
        None => log_decorated!("No location selected"),
    }
    log_decorated!("Preferred timing: {}", ctx.registry.alarm_timing().label());

    match pending {
        Some(notification) => log_decorated!(
            "Pending notification: \"{}\" at {}",
            notification.body,
            format_instant(&notification.fire_instant)
        ),
        None => log_decorated!("No pending notification"),
    }
    log_indented!("State: {}", private_path(&ctx.state_dir));
    Ok(())
}
