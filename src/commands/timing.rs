//! `timing` command: show or change which side of sunrise the alarm fires on.

use anyhow::Result;

use super::AppContext;
use crate::common::utils::format_offset_minutes;
use crate::registry::AlarmTiming;

pub fn handle_timing_command(ctx: &AppContext, timing: Option<AlarmTiming>) -> Result<()> {
    let Some(timing) = timing else {
        let current = ctx.registry.alarm_timing();
        log_block_start!(
            "Alarm timing: {} ({})",
            current.label(),
            format_offset_minutes(current.offset_minutes())
        );
        return Ok(());
    };

    ctx.registry.set_alarm_timing(timing)?;
    log_block_start!("Alarm timing set to {}", timing.label());

    // The armed alarm keeps its fire instant until it is recomputed
    if ctx.scheduler.status().state.enabled {
        log_indented!("Run 'sunrise-alarm refresh' to reschedule the armed alarm");
    }
    Ok(())
}
