//! `sunrise` command: look up today's or tomorrow's sunrise for the selected location.

use anyhow::{Context, Result};
use serde_json::json;

use super::{AppContext, format_instant};
use crate::alarm::compute_fire_instant;
use crate::args::SunriseDay;

pub async fn handle_sunrise_command(ctx: &AppContext, day: SunriseDay, json: bool) -> Result<()> {
    let location = ctx.require_selected()?;
    let resolver = ctx.scheduler.resolver();

    let (label, sunrise) = match day {
        SunriseDay::Today => (
            "Today",
            resolver
                .resolve_today(location.latitude, location.longitude)
                .await,
        ),
        SunriseDay::Tomorrow => (
            "Tomorrow",
            resolver
                .resolve_tomorrow(location.latitude, location.longitude)
                .await,
        ),
    };
    let sunrise = sunrise.with_context(|| format!("Failed to resolve sunrise for {}", location.name))?;

    let timing = ctx.registry.alarm_timing();
    let fire = compute_fire_instant(&sunrise, timing);

    if json {
        return super::print_json(&json!({
            "location": location.name,
            "day": label.to_lowercase(),
            "sunrise": sunrise.to_rfc3339(),
            "timezone": sunrise.timezone().name(),
            "alarm_timing": timing.as_str(),
            "alarm_at": fire.to_rfc3339(),
        }));
    }

    log_block_start!("{} at {}", label, location.name);
    log_indented!("Sunrise: {}", format_instant(&sunrise));
    log_indented!("Alarm would fire: {} ({})", format_instant(&fire), timing.label());
    Ok(())
}
