//! `refresh` command: the periodic entry point.
//!
//! Meant to be run from a timer (cron, systemd) a couple of times a day. It
//! re-resolves tomorrow's sunrise and reschedules an armed alarm; when the
//! lookup fails the armed alarm stays as it was.

use anyhow::Result;

use super::{AppContext, format_instant};

pub async fn handle_refresh_command(ctx: &AppContext) -> Result<()> {
    let outcome = match ctx.scheduler.refresh().await {
        Ok(outcome) => outcome,
        Err(e) => {
            let message = if e.is_resolution_failure() {
                "Could not resolve tomorrow's sunrise; the current alarm was left unchanged"
            } else {
                "Refresh failed"
            };
            return Err(anyhow::Error::new(e).context(message));
        }
    };

    log_block_start!("Tomorrow's sunrise: {}", format_instant(&outcome.sunrise));
    match outcome.rescheduled {
        Some(fire) => log_indented!("Alarm rescheduled for {}", format_instant(&fire)),
        None => log_indented!("No sunrise alarm armed; nothing rescheduled"),
    }
    Ok(())
}
