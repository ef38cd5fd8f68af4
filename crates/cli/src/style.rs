//! Terminal styling for recovery messages.

use console::Style;

fn marked(mark: &str, style: Style, msg: &str) -> String {
    format!("{} {}", style.apply_to(mark), msg)
}

/// Green check mark before `msg`.
pub fn success(msg: &str) -> String {
    marked("✓", Style::new().green(), msg)
}

/// Yellow warning sign before `msg`.
pub fn warn(msg: &str) -> String {
    marked("⚠", Style::new().yellow(), msg)
}

pub fn header(msg: &str) -> String {
    Style::new().bold().apply_to(msg).to_string()
}

pub fn dim(msg: &str) -> String {
    Style::new().dim().apply_to(msg).to_string()
}

/// Status cell for a path git already tracks.
pub fn tracked() -> String {
    Style::new().blue().bold().apply_to("tracked").to_string()
}

/// Status cell for a path git does not know yet.
pub fn new_file() -> String {
    Style::new().magenta().bold().apply_to("new").to_string()
}
