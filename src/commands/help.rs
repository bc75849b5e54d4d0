//! Help output: general usage, per-command help and short usage lines.

use anyhow::Result;

/// Show brief usage for a command (used for error messages)
pub fn show_command_usage(command: &str) {
    match command {
        "location" | "l" => log_block_start!(
            "Usage: sunrise-alarm location [add <name> <lat> <lon> [--select] | list | select <id> | delete <id> | rename <id> <name>]"
        ),
        "timing" => log_block_start!("Usage: sunrise-alarm timing [before|after]"),
        "sunrise" | "s" => log_block_start!("Usage: sunrise-alarm sunrise [today|tomorrow]"),
        "alarm" | "a" => {
            log_block_start!("Usage: sunrise-alarm alarm [set | cancel | status | test [seconds]]")
        }
        "refresh" | "r" => log_block_start!("Usage: sunrise-alarm refresh"),
        _ => log_block_start!("Usage: sunrise-alarm [OPTIONS] <COMMAND>"),
    }
}

/// Run the help command for `command`, or general help when None.
pub fn run_help_command(command: Option<&str>) -> Result<()> {
    match command {
        None => display_general_help(),
        Some("location") | Some("l") => display_location_help(),
        Some("timing") => display_timing_help(),
        Some("sunrise") | Some("s") => display_sunrise_help(),
        Some("alarm") | Some("a") => display_alarm_help(),
        Some("refresh") | Some("r") => display_refresh_help(),
        Some(unknown) => {
            log_warning!("Unknown command: {unknown}");
            display_general_help();
        }
    }
    Ok(())
}

/// Full usage, shown for `--help` and after argument errors.
pub fn display_usage() {
    log_version!();
    show_command_usage("");
    log_block_start!("Commands:");
    log_indented!("location, l   Manage saved locations and the selection");
    log_indented!("timing        Show or set alarm timing (before/after sunrise)");
    log_indented!("sunrise, s    Look up sunrise for the selected location");
    log_indented!("alarm, a      Set, cancel, inspect or test the alarm");
    log_indented!("refresh, r    Re-resolve sunrise and reschedule the armed alarm");
    log_indented!("help, h       Show help for a command");
    log_block_start!("Options:");
    log_indented!("-c, --config <dir>  Use a custom configuration directory");
    log_indented!("-d, --debug         Show detailed output");
    log_indented!("-q, --quiet         Suppress decorated output");
    log_indented!("    --json          Machine-readable output (list, status, sunrise)");
    log_indented!("    --log <path>    Also write output to a file");
    log_indented!("-h, --help          Show this help");
    log_indented!("-V, --version       Show version");
    log_end!();
}

fn display_general_help() {
    log_version!();
    log_block_start!("Available Commands:");
    log_indented!("location, l <subcommand>  Manage saved locations");
    log_indented!("timing [before|after]     Alarm fires 10 minutes before or after sunrise");
    log_indented!("sunrise, s [today|tomorrow]");
    log_indented!("alarm, a <subcommand>     set, cancel, status, test");
    log_indented!("refresh, r                Periodic reschedule entry point");
    log_pipe!();
    log_info!("Use 'sunrise-alarm help <command>' to see detailed help for a specific command.");
    log_end!();
}

fn display_location_help() {
    log_version!();
    log_block_start!("location - Manage saved locations");
    show_command_usage("location");
    log_block_start!("Subcommands:");
    log_indented!("add <name> <lat> <lon>  Save a location (decimal degrees)");
    log_indented!("    --select            Also make it the selected location");
    log_indented!("list                    List locations; '*' marks the selection");
    log_indented!("select <id>             Select by id or unique id prefix");
    log_indented!("delete <id>             Delete; deleting the selection leaves none selected");
    log_indented!("rename <id> <name>      Change the display name");
    log_block_start!("Examples:");
    log_indented!("sunrise-alarm location add Reykjavik 64.1466 -21.9426 --select");
    log_indented!("sunrise-alarm location select 3f2a");
    log_end!();
}

fn display_timing_help() {
    log_version!();
    log_block_start!("timing - Choose which side of sunrise the alarm fires on");
    show_command_usage("timing");
    log_block_start!("Without an argument, shows the current preference.");
    log_indented!("The change applies the next time the alarm is set or refreshed.");
    log_end!();
}

fn display_sunrise_help() {
    log_version!();
    log_block_start!("sunrise - Look up sunrise for the selected location");
    show_command_usage("sunrise");
    log_block_start!("Defaults to tomorrow, the day the alarm is armed for.");
    log_end!();
}

fn display_alarm_help() {
    log_version!();
    log_block_start!("alarm - Manage the single sunrise alarm");
    show_command_usage("alarm");
    log_block_start!("Subcommands:");
    log_indented!("set             Arm a daily alarm relative to tomorrow's sunrise");
    log_indented!("cancel          Disable the alarm and withdraw pending notifications");
    log_indented!("status          Show the alarm and the pending notification");
    log_indented!("test [seconds]  One-off test alarm (default 10s), replaces the armed alarm");
    log_end!();
}

fn display_refresh_help() {
    log_version!();
    log_block_start!("refresh - Recompute the armed alarm from a fresh sunrise lookup");
    show_command_usage("refresh");
    log_block_start!("Run it from a timer, e.g. every 12 hours:");
    log_indented!("0 */12 * * * sunrise-alarm --quiet refresh");
    log_indented!("A failed lookup leaves the armed alarm unchanged.");
    log_end!();
}
