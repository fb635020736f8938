use chrono::Local;
use nu_ansi_term::{Color, Style};
use std::fmt;
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields},
    prelude::*,
    registry::LookupSpan,
    EnvFilter, Layer,
};

/// Target for per-wallet outcome lines (created, funded, evicted, sent).
/// These are shown at INFO; everything else only from WARN up.
pub const OUTCOME_TARGET: &str = "outcome";

pub fn setup_logger(log_dir: &str) -> Option<WorkerGuard> {
    if let Err(e) = std::fs::create_dir_all(log_dir) {
        eprintln!("Cannot create log directory {}: {}", log_dir, e);
        return None;
    }

    let file_appender = tracing_appender::rolling::hourly(log_dir, "faucet");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .event_format(FileFormatter)
        .with_filter(file_filter());

    // RUST_LOG wins over the default console filter
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{}=info,warn", OUTCOME_TARGET)));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .event_format(TerminalFormatter)
        .with_filter(console_filter);

    if tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .is_err()
    {
        eprintln!("A global tracing subscriber is already installed");
    }

    // Caller must keep the guard alive or buffered file lines are lost
    Some(guard)
}

fn file_filter() -> tracing_subscriber::filter::Targets {
    tracing_subscriber::filter::Targets::new()
        .with_target(OUTCOME_TARGET, Level::INFO)
        .with_default(Level::WARN)
}

// --- Formatters ---

struct MessageVisitor {
    message: String,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

fn paint_words(msg: String, words: &[&str], color: Color) -> String {
    let style = Style::new().fg(color).bold();
    words.iter().fold(msg, |acc, w| {
        let painted = style.paint(*w).to_string();
        acc.replace(*w, &painted)
    })
}

fn colorize(msg: String) -> String {
    if msg.contains("SUCCESS") || msg.contains("Success") {
        paint_words(msg, &["SUCCESS", "Success"], Color::LightGreen)
    } else if msg.contains("FAILED") || msg.contains("Failed") {
        paint_words(msg, &["FAILED", "Failed"], Color::LightRed)
    } else {
        msg
    }
}

pub struct TerminalFormatter;

impl<S, N> FormatEvent<S, N> for TerminalFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut msg_visitor = MessageVisitor {
            message: String::new(),
        };
        event.record(&mut msg_visitor);

        let time = Style::new()
            .fg(Color::DarkGray)
            .paint(Local::now().format("%H:%M:%S").to_string());
        write!(writer, "[{}] ", time)?;

        match *event.metadata().level() {
            Level::ERROR => write!(writer, "{} ", Color::Red.bold().paint("ERROR"))?,
            Level::WARN => write!(writer, "{} ", Color::Yellow.bold().paint("WARN"))?,
            _ => {}
        }

        writeln!(writer, "{}", colorize(msg_visitor.message))
    }
}

pub struct FileFormatter;

impl<S, N> FormatEvent<S, N> for FileFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let level = event.metadata().level();

        write!(writer, "{} [{}] ", timestamp, level)?;

        let mut msg_visitor = MessageVisitor {
            message: String::new(),
        };
        event.record(&mut msg_visitor);
        writeln!(writer, "{}", msg_visitor.message)
    }
}
