//! Log output.
//!
//! Stdout belongs to the generated shell script, so every log line goes to stderr, printed
//! while the progress bars are suspended.

use std::{
    io::{self, Write as _},
    mem,
};

use nu_ansi_term::Color::{self, Blue, Magenta, Red, Yellow};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields, Subscriber as FmtSubscriber},
    registry::LookupSpan,
};

use crate::{cli::Args, error::CliResult, progress, utils::Colored};

/// Bare message for INFO, a coloured `[LEVEL]` tag for everything else.
struct LevelTagged;

fn level_tag(level: Level) -> Option<(Color, &'static str)> {
    match level {
        Level::TRACE => Some((Magenta, "[TRACE]")),
        Level::DEBUG => Some((Blue, "[DEBUG]")),
        Level::INFO => None,
        Level::WARN => Some((Yellow, "[WARN]")),
        Level::ERROR => Some((Red, "[ERROR]")),
    }
}

impl<S, N> FormatEvent<S, N> for LevelTagged
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        if let Some((color, tag)) = level_tag(*event.metadata().level()) {
            write!(writer, "{} ", Colored(color, tag))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// One formatted event, handed to stderr in a single write when dropped.
#[derive(Default)]
struct LogLine(Vec<u8>);

impl io::Write for LogLine {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for LogLine {
    fn drop(&mut self) {
        if self.0.is_empty() {
            return;
        }

        let line = mem::take(&mut self.0);
        progress::suspend(|| {
            let mut stderr = io::stderr().lock();
            // Nowhere left to report a failing stderr.
            let _ = stderr.write_all(&line).and_then(|_| stderr.flush());
        });
    }
}

fn filter_level(args: &Args) -> Level {
    match (args.quiet, args.verbose) {
        (true, _) => Level::ERROR,
        (false, 0) => Level::INFO,
        (false, 1) => Level::DEBUG,
        (false, _) => Level::TRACE,
    }
}

/// Installs the global subscriber: `qh*` targets only, JSON lines with `--json`.
pub fn setup_logging(args: &Args) -> CliResult<()> {
    let builder = FmtSubscriber::builder()
        .with_env_filter(format!("qh={}", filter_level(args)))
        .with_target(false)
        .with_writer(LogLine::default)
        .without_time();

    if args.json {
        tracing::subscriber::set_global_default(builder.json().flatten_event(true).finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.event_format(LevelTagged).finish())?;
    }

    Ok(())
}
