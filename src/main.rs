//! `sunrise-alarm` entry point.
//!
//! Parses arguments, sets up logging and configuration, then hands the action
//! to the matching command in [`sunrise_alarm::commands`]. Each invocation does
//! one thing and exits; `refresh` is meant to be run periodically by a timer.

use anyhow::Result;

use sunrise_alarm::args::{CliAction, GlobalOptions, ParsedArgs};
use sunrise_alarm::commands::{self, AppContext};
use sunrise_alarm::common::constants::{EXIT_FAILURE, EXIT_SUCCESS};
use sunrise_alarm::config::{self, Config};
use sunrise_alarm::logger::Log;
use sunrise_alarm::{log_debug, log_end, log_error_exit, log_pipe, log_version};

#[tokio::main]
async fn main() {
    let ParsedArgs { action, options } = ParsedArgs::parse(std::env::args());

    // JSON output must stay parseable, so decorated output is off for it too
    Log::set_enabled(!options.quiet && !options.json);
    Log::set_debug(options.debug_enabled);

    match action {
        CliAction::ShowVersion => {
            log_version!();
            log_end!();
            return;
        }
        CliAction::ShowHelp => {
            commands::help::display_usage();
            return;
        }
        CliAction::ShowHelpDueToError => {
            commands::help::display_usage();
            std::process::exit(EXIT_FAILURE);
        }
        _ => {}
    }

    let log_guard = match &options.log_file {
        Some(path) => match Log::start_file_logging(path.clone()) {
            Ok(guard) => Some(guard),
            Err(e) => {
                eprintln!("error: could not start file logging: {e:#}");
                std::process::exit(EXIT_FAILURE);
            }
        },
        None => None,
    };

    let code = match run(action, &options).await {
        Ok(()) => {
            log_end!();
            EXIT_SUCCESS
        }
        Err(e) => {
            if Log::is_enabled() {
                log_error_exit!("{e:#}");
            } else {
                eprintln!("error: {e:#}");
            }
            EXIT_FAILURE
        }
    };

    // Flush the file logger before exiting
    drop(log_guard);
    std::process::exit(code);
}

async fn run(action: CliAction, options: &GlobalOptions) -> Result<()> {
    log_version!();
    if options.debug_enabled {
        log_pipe!();
        log_debug!("Debug mode enabled");
    }

    if let CliAction::Help { command } = &action {
        return commands::help::run_help_command(command.as_deref());
    }

    config::set_config_dir(options.config_dir.clone())?;
    let config = Config::load()?;
    if options.debug_enabled {
        config.log_config();
    }

    let ctx = AppContext::build(config)?;

    match action {
        CliAction::Location(command) => {
            commands::location::handle_location_command(&ctx, command, options.json)
        }
        CliAction::Timing { timing } => commands::timing::handle_timing_command(&ctx, timing),
        CliAction::Sunrise { day } => {
            commands::sunrise::handle_sunrise_command(&ctx, day, options.json).await
        }
        CliAction::Alarm(command) => {
            commands::alarm::handle_alarm_command(&ctx, command, options.json).await
        }
        CliAction::Refresh => commands::refresh::handle_refresh_command(&ctx).await,
        CliAction::Help { .. }
        | CliAction::ShowHelp
        | CliAction::ShowVersion
        | CliAction::ShowHelpDueToError => Ok(()),
    }
}
