//! `location` command: manage saved locations and the selection.

use anyhow::{Context, Result};
use serde_json::json;

use super::AppContext;
use crate::args::LocationCommand;
use crate::registry::{SavedLocation, validate_coordinates};

/// Characters of the id shown in listings; enough for `select`/`delete` prefixes.
const SHORT_ID_LEN: usize = 8;

pub fn handle_location_command(ctx: &AppContext, command: LocationCommand, json: bool) -> Result<()> {
    match command {
        LocationCommand::Add {
            name,
            latitude,
            longitude,
            select,
        } => add(ctx, name, latitude, longitude, select),
        LocationCommand::List => list(ctx, json),
        LocationCommand::Select { id } => {
            let location = find(ctx, &id)?;
            ctx.registry.select(location.id)?;
            log_block_start!("Selected {}", location.name);
            log_indented!("Run 'sunrise-alarm alarm set' to arm the alarm for this location");
            Ok(())
        }
        LocationCommand::Delete { id } => {
            let location = find(ctx, &id)?;
            ctx.registry.delete(location.id)?;
            log_block_start!("Deleted {}", location.name);
            if location.is_selected {
                log_indented!("No location is selected now");
            }
            let status = ctx.scheduler.status();
            if status.state.enabled && status.state.location_label == location.name {
                log_indented!("The armed alarm keeps firing until cancelled or refreshed");
            }
            Ok(())
        }
        LocationCommand::Rename { id, name } => {
            let location = find(ctx, &id)?;
            ctx.registry.rename(location.id, &name)?;
            log_block_start!("Renamed {} to {}", location.name, name);
            Ok(())
        }
    }
}

fn add(ctx: &AppContext, name: String, latitude: f64, longitude: f64, select: bool) -> Result<()> {
    validate_coordinates(latitude, longitude).context("Invalid coordinates")?;
    if name.trim().is_empty() {
        anyhow::bail!("Location name cannot be empty");
    }

    let location = SavedLocation::new(name.trim(), latitude, longitude);
    let stored = if select {
        ctx.registry.add_and_select(location)?
    } else {
        ctx.registry.add(location)?
    };

    log_block_start!("Saved {} ({:.4}, {:.4})", stored.name, latitude, longitude);
    log_indented!("Id: {}", stored.id);
    if stored.is_selected {
        log_indented!("Selected");
    }
    Ok(())
}

fn list(ctx: &AppContext, json: bool) -> Result<()> {
    let locations = ctx.registry.list();

    if json {
        return super::print_json(&json!({ "locations": locations }));
    }

    if locations.is_empty() {
        log_block_start!("No saved locations");
        log_indented!("Add one with 'sunrise-alarm location add <name> <latitude> <longitude>'");
        return Ok(());
    }

    log_block_start!("Saved locations:");
    for location in &locations {
        let id = location.id.to_string();
        log_indented!(
            "{} {}  {:<20} {:>9.4} {:>10.4}",
            if location.is_selected { "*" } else { " " },
            &id[..SHORT_ID_LEN],
            location.name,
            location.latitude,
            location.longitude
        );
    }
    Ok(())
}

fn find(ctx: &AppContext, id: &str) -> Result<SavedLocation> {
    ctx.registry
        .find_by_prefix(id)
        .with_context(|| format!("No single saved location matches id '{id}'"))
}
