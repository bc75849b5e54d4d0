//! Small formatting helpers shared by commands and loaders.

use std::path::Path;

/// Render a path for log output with the home directory replaced by `~`.
pub fn private_path(path: &Path) -> String {
    if let Some(home) = dirs::home_dir()
        && let Ok(stripped) = path.strip_prefix(&home)
    {
        return format!("~/{}", stripped.display());
    }
    path.display().to_string()
}

/// Format a signed minute offset the way it is shown to users ("-10 min").
pub fn format_offset_minutes(minutes: i64) -> String {
    if minutes >= 0 {
        format!("+{minutes} min")
    } else {
        format!("{minutes} min")
    }
}
