//! Logging to the terminal and the session log file
//!
//! Every line is stamped with the seconds since the session epoch. The
//! terminal gets coloured level tags, the log file gets plain ones so it stays
//! readable with ordinary text tools. Debug and trace lines also name the
//! module that emitted them.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use colored::{ColoredString, Colorize};
use log::{info, Level};
use std::fmt;
use thiserror::Error;

// Internal imports
use crate::session::{self, Session};

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("The log level must be info or more verbose, found `{0}`")]
    InvalidMinLogLevel(LevelFilter),

    #[error("Could not open the log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("A logger is already installed: {0}")]
    FernInitError(log::SetLoggerError),
}

/// How the level tag at the start of a line is rendered.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum TagStyle {
    Coloured,
    Plain,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Install the global logger, writing to stdout and the session's log file.
///
/// `min_level` must be `Info`, `Debug` or `Trace`, mission progress is logged
/// at info and must not be filtered out. The odometry loop logs every cycle
/// at trace, so `Trace` produces a very large file over a full mission.
///
/// Only the first call in a process can succeed.
pub fn logger_init(min_level: LevelFilter, session: &Session) -> Result<(), LoggerInitError> {
    check_min_level(min_level)?;

    let log_file =
        fern::log_file(&session.log_file_path).map_err(LoggerInitError::LogFileInitError)?;

    let terminal = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}",
                format_line(
                    session::get_elapsed_seconds(),
                    record.level(),
                    record.target(),
                    message,
                    TagStyle::Coloured
                )
            ))
        })
        .chain(std::io::stdout());

    let file = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}",
                format_line(
                    session::get_elapsed_seconds(),
                    record.level(),
                    record.target(),
                    message,
                    TagStyle::Plain
                )
            ))
        })
        .chain(log_file);

    fern::Dispatch::new()
        .level(min_level)
        .chain(terminal)
        .chain(file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!("Logging initialised");
    info!("    Session epoch: {}", session::get_epoch());
    info!("    Log level: {:?}", min_level);
    info!("    Log file path: {:?}", session.log_file_path);

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn check_min_level(min_level: LevelFilter) -> Result<(), LoggerInitError> {
    if min_level < Level::Info {
        Err(LoggerInitError::InvalidMinLogLevel(min_level))
    } else {
        Ok(())
    }
}

/// Render one log line, without the trailing newline.
fn format_line(
    elapsed_s: f64,
    level: Level,
    target: &str,
    message: &fmt::Arguments,
    style: TagStyle,
) -> String {
    let tag = match style {
        TagStyle::Coloured => level_tag(level).to_string(),
        TagStyle::Plain => level_tag(level).clear().to_string(),
    };

    if level > Level::Info {
        format!("[{:10.6} {}] {}: {}", elapsed_s, tag, target, message)
    } else {
        format!("[{:10.6} {}] {}", elapsed_s, tag, message)
    }
}

fn level_tag(level: Level) -> ColoredString {
    match level {
        Level::Trace => "TRC".dimmed().italic(),
        Level::Debug => "DBG".dimmed(),
        Level::Info => "INF".normal(),
        Level::Warn => "WRN".yellow(),
        Level::Error => "ERR".red().bold(),
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
