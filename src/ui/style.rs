use console::style;
use std::fmt::Display;

/// Green bold: delivered writes, completed drains
pub fn success<D: Display>(text: D) -> String {
    style(text).green().bold().to_string()
}

/// Yellow bold: queued writes and the offline banner
pub fn pending<D: Display>(text: D) -> String {
    style(text).yellow().bold().to_string()
}

/// Red bold: rejected or failed writes
pub fn failure<D: Display>(text: D) -> String {
    style(text).red().bold().to_string()
}

/// White bold: section headers
pub fn header<D: Display>(text: D) -> String {
    style(text).white().bold().to_string()
}

/// Dim: secondary text, timestamps, truncated errors
pub fn dim<D: Display>(text: D) -> String {
    style(text).dim().to_string()
}

/// Green: ids, paths, names
pub fn value<D: Display>(text: D) -> String {
    style(text).green().to_string()
}

/// Cyan: field labels
pub fn label<D: Display>(text: D) -> String {
    style(text).cyan().to_string()
}
