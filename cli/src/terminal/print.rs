use colored::*;
use tracing::info;

use super::logging::PRINT_TARGET;

pub const TOTAL_WIDTH: usize = 64;
const KEY_WIDTH: usize = 16;

const PRIMARY: Color = Color::BrightGreen;
const SEPARATOR: Color = Color::BrightBlack;
const TEXT_DEFAULT: Color = Color::White;

pub fn print(msg: &str) {
    info!(target: PRINT_TARGET, raw_msg = msg);
}

pub fn header(msg: &str) {
    let formatted: String = format!("⟦ {} ⟧", msg);
    let msg_len: usize = formatted.chars().count();

    let dash_count: usize = TOTAL_WIDTH.saturating_sub(msg_len);
    let left: usize = dash_count / 2;
    let right: usize = dash_count - left;

    let line: ColoredString = format!(
        "{}{}{}",
        "─".repeat(left),
        formatted.to_uppercase().bright_green(),
        "─".repeat(right)
    )
    .bright_black();

    print(&format!("{}", line));
}

pub fn fat_separator() {
    let sep: ColoredString = "═".repeat(TOTAL_WIDTH).bright_black();
    print(&format!("{}", sep));
}

pub fn aligned_line(key: &str, value: impl std::fmt::Display) {
    let dots: String = ".".repeat((KEY_WIDTH + 1).saturating_sub(key.len()));
    print(&format!(
        "{} {}{}{} {}",
        ">".color(SEPARATOR),
        key.color(PRIMARY),
        dots.color(SEPARATOR),
        ":".color(SEPARATOR),
        value
    ));
}

/// One table row per entry: `[idx] head` followed by `key: value` branches.
pub fn tree(idx: usize, head: &str, details: &[(&str, ColoredString)]) {
    print(&format!(
        "{}{}{} {}",
        "[".color(SEPARATOR),
        idx.to_string().bright_cyan(),
        "]".color(SEPARATOR),
        head.color(PRIMARY)
    ));

    for (i, (key, value)) in details.iter().enumerate() {
        let branch: ColoredString = if i + 1 < details.len() {
            "├─".bright_black()
        } else {
            "└─".bright_black()
        };
        print(&format!(
            " {} {}{}{} {}",
            branch,
            key.color(TEXT_DEFAULT),
            ".".repeat(8usize.saturating_sub(key.len())).color(SEPARATOR),
            ":".color(SEPARATOR),
            value
        ));
    }
}

pub fn flag(value: bool) -> ColoredString {
    if value { "yes".yellow() } else { "no".normal() }
}
