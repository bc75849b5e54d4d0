//! Command-line argument parsing.
//!
//! Global flags may appear anywhere on the command line. Everything else is
//! read as a command followed by its arguments. Negative numbers are
//! arguments, not flags, so `location add Lima -12.04 -77.04` works.

use crate::registry::AlarmTiming;

/// `location` subcommands.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationCommand {
    Add {
        name: String,
        latitude: f64,
        longitude: f64,
        select: bool,
    },
    List,
    /// `id` is a full id or a unique prefix of one.
    Select { id: String },
    Delete { id: String },
    Rename { id: String, name: String },
}

/// `alarm` subcommands.
#[derive(Debug, Clone, PartialEq)]
pub enum AlarmCommand {
    Set,
    Cancel,
    Status,
    /// One-off alarm after `delay_secs`.
    Test { delay_secs: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SunriseDay {
    Today,
    Tomorrow,
}

/// What the process was asked to do.
#[derive(Debug, Clone, PartialEq)]
pub enum CliAction {
    Location(LocationCommand),
    /// Show the timing preference, or change it when given.
    Timing { timing: Option<AlarmTiming> },
    Sunrise { day: SunriseDay },
    Alarm(AlarmCommand),
    Refresh,
    Help { command: Option<String> },
    ShowHelp,
    ShowVersion,
    /// Show help due to unusable arguments and exit
    ShowHelpDueToError,
}

/// Flags that apply to every command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalOptions {
    pub debug_enabled: bool,
    pub quiet: bool,
    pub json: bool,
    pub config_dir: Option<String>,
    pub log_file: Option<String>,
}

/// Result of parsing command-line arguments.
#[derive(Debug, PartialEq)]
pub struct ParsedArgs {
    pub action: CliAction,
    pub options: GlobalOptions,
}

impl ParsedArgs {
    /// Parse `args`, whose first item is the program name.
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args_vec: Vec<String> = args
            .into_iter()
            .skip(1)
            .map(|s| s.as_ref().to_string())
            .collect();

        let mut options = GlobalOptions::default();
        let mut positionals = Vec::new();
        let mut select_flag = false;
        let mut show_help = false;
        let mut show_version = false;
        let mut error = false;

        let mut i = 0;
        while i < args_vec.len() {
            let arg = args_vec[i].as_str();
            match arg {
                "--help" | "-h" => show_help = true,
                "--version" | "-V" | "-v" => show_version = true,
                "--debug" | "-d" => options.debug_enabled = true,
                "--quiet" | "-q" => options.quiet = true,
                "--json" => options.json = true,
                "--select" => select_flag = true,
                "--config" | "-c" | "--log" => match args_vec.get(i + 1) {
                    Some(value) if !value.starts_with('-') => {
                        if arg == "--log" {
                            options.log_file = Some(value.clone());
                        } else {
                            options.config_dir = Some(value.clone());
                        }
                        i += 1;
                    }
                    _ => {
                        log_warning!("Missing value for {arg}");
                        error = true;
                    }
                },
                _ if arg.starts_with('-') && arg.parse::<f64>().is_err() => {
                    log_warning!("Unknown option: {arg}");
                    error = true;
                }
                _ => positionals.push(arg.to_string()),
            }
            i += 1;
        }

        let action = if show_version {
            CliAction::ShowVersion
        } else if show_help {
            CliAction::ShowHelp
        } else if error {
            CliAction::ShowHelpDueToError
        } else {
            parse_command(&positionals, select_flag)
        };

        ParsedArgs { action, options }
    }
}

fn parse_command(positionals: &[String], select_flag: bool) -> CliAction {
    let Some((command, rest)) = positionals.split_first() else {
        return CliAction::ShowHelp;
    };
    let rest: Vec<&str> = rest.iter().map(String::as_str).collect();

    match command.as_str() {
        "location" | "l" => parse_location(&rest, select_flag),
        "timing" => match rest.as_slice() {
            [] => CliAction::Timing { timing: None },
            [value] => match value.parse() {
                Ok(timing) => CliAction::Timing {
                    timing: Some(timing),
                },
                Err(e) => usage_error(&format!("{e}"), "timing"),
            },
            _ => usage_error("Too many arguments", "timing"),
        },
        "sunrise" | "s" => match rest.as_slice() {
            [] | ["tomorrow"] => CliAction::Sunrise {
                day: SunriseDay::Tomorrow,
            },
            ["today"] => CliAction::Sunrise {
                day: SunriseDay::Today,
            },
            _ => usage_error("Expected 'today' or 'tomorrow'", "sunrise"),
        },
        "alarm" | "a" => parse_alarm(&rest),
        "refresh" | "r" => match rest.as_slice() {
            [] => CliAction::Refresh,
            _ => usage_error("refresh takes no arguments", "refresh"),
        },
        "help" | "h" => CliAction::Help {
            command: rest.first().map(|command| command.to_string()),
        },
        unknown => {
            log_warning!("Unknown command: {unknown}");
            CliAction::ShowHelpDueToError
        }
    }
}

fn parse_location(rest: &[&str], select_flag: bool) -> CliAction {
    let command = match rest {
        ["add", name, latitude, longitude] => {
            match (latitude.parse::<f64>(), longitude.parse::<f64>()) {
                (Ok(latitude), Ok(longitude)) => LocationCommand::Add {
                    name: name.to_string(),
                    latitude,
                    longitude,
                    select: select_flag,
                },
                _ => return usage_error("Coordinates must be decimal degrees", "location"),
            }
        }
        ["list"] | [] => LocationCommand::List,
        ["select", id] => LocationCommand::Select { id: id.to_string() },
        ["delete", id] => LocationCommand::Delete { id: id.to_string() },
        ["rename", id, name] => LocationCommand::Rename {
            id: id.to_string(),
            name: name.to_string(),
        },
        _ => return usage_error("Invalid location command", "location"),
    };
    CliAction::Location(command)
}

fn parse_alarm(rest: &[&str]) -> CliAction {
    let command = match rest {
        ["set"] => AlarmCommand::Set,
        ["cancel"] => AlarmCommand::Cancel,
        ["status"] | [] => AlarmCommand::Status,
        ["test"] => AlarmCommand::Test {
            delay_secs: crate::common::constants::DEFAULT_DIAGNOSTIC_DELAY_SECS,
        },
        ["test", delay] => match delay.parse::<u64>() {
            Ok(delay_secs) => AlarmCommand::Test { delay_secs },
            Err(_) => return usage_error("Delay must be a whole number of seconds", "alarm"),
        },
        _ => return usage_error("Invalid alarm command", "alarm"),
    };
    CliAction::Alarm(command)
}

fn usage_error(message: &str, command: &str) -> CliAction {
    log_warning!("{message}");
    crate::commands::help::show_command_usage(command);
    CliAction::ShowHelpDueToError
}
