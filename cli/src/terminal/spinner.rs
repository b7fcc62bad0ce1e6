use std::io::{self, Write};
use std::sync::OnceLock;
use std::time::Duration;

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

const TICK: Duration = Duration::from_millis(100);

pub struct SpinnerHandle {
    spinner: ProgressBar,
}

impl SpinnerHandle {
    /// Runs `f` with the spinner cleared from the terminal.
    pub fn suspend<F: FnOnce() -> R, R>(&self, f: F) -> R {
        self.spinner.suspend(f)
    }

    pub fn finish_and_clear(&self) {
        self.spinner.finish_and_clear();
    }

    pub fn set_message(&self, msg: String) {
        self.spinner.set_message(msg);
    }
}

static SPINNER: OnceLock<SpinnerHandle> = OnceLock::new();

/// Sets the spinner up once. A hidden spinner still routes log output.
pub fn init(visible: bool) {
    SPINNER.get_or_init(|| init_spinner(visible));
}

pub fn get_spinner() -> &'static SpinnerHandle {
    SPINNER.get_or_init(|| init_spinner(false))
}

fn init_spinner(visible: bool) -> SpinnerHandle {
    if !visible {
        return SpinnerHandle {
            spinner: ProgressBar::hidden(),
        };
    }

    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.blue} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&[
            "▁▁▁▁▁",
            "▁▂▂▂▁",
            "▁▄▂▄▁",
            "▂▄▆▄▂",
            "▄▆█▆▄",
            "▂▄▆▄▂",
            "▁▄▂▄▁",
            "▁▂▂▂▁",
        ]);

    pb.set_style(style);
    pb.enable_steady_tick(TICK);

    SpinnerHandle { spinner: pb }
}

pub fn report_progress(alive: u64, noun: &str) {
    get_spinner().set_message(format!(
        "{} {noun} so far...",
        alive.to_string().green().bold()
    ));
}

/// Log sink that keeps lines from being drawn over by the spinner.
pub struct SpinnerWriter;

impl Write for SpinnerWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        get_spinner().suspend(|| io::stdout().lock().write_all(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()
    }
}
