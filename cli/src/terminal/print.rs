use std::time::Duration;

use colored::*;
use tracing::info;

pub const PRINT_TARGET: &str = "shoal::print";
pub const TOTAL_WIDTH: usize = 64;

pub fn print(msg: &str) {
    info!(target: PRINT_TARGET, "{msg}");
}

pub fn header(msg: &str, quiet: u8) {
    if quiet > 0 {
        return;
    }

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

pub fn summary(total: u64, alive: u64, elapsed: Duration) {
    print(&format!(
        "{} {}, {} {}, {} {:.2?}",
        "total:".bright_black(),
        total,
        "alive:".bright_black(),
        alive.to_string().green().bold(),
        "time:".bright_black(),
        elapsed
    ));
}
