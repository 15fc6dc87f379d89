use chrono::{Local, NaiveDateTime};
use std::fmt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;

const TIME_FORMAT: &str = "%x - %I:%M.%S%p";

/// Local wall-clock timestamps, e.g. `03/05/24 - 02:07.09PM`.
struct LocalTime;

impl FormatTime for LocalTime {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "{}", stamp(Local::now().naive_local()))
    }
}

fn stamp(time: NaiveDateTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

/// Filter for a `-v` count: 0 defers to `RUST_LOG` (warn when unset), then
/// info, debug and trace.
pub fn filter_for(verbose: u8) -> EnvFilter {
    match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}

/// Install the stderr subscriber used by the command-line tools.
pub fn init(verbose: u8) {
    tracing_subscriber::fmt()
        .with_env_filter(filter_for(verbose))
        .with_timer(LocalTime)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
