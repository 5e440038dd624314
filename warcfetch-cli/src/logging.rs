//! Logging setup.
//!
//! Maps the `-v` count onto tracing levels (errors only by default, `-v`
//! for info, `-vv` for debug) and optionally routes output to a log file
//! instead of stderr.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber.
///
/// Returns the appender guard when logging to a file; it must stay alive
/// for the duration of the process or buffered lines are lost.
pub fn init(verbose: u8, log_file: Option<&Path>) -> std::io::Result<Option<WorkerGuard>> {
    let level = match verbose {
        0 => "error",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warcfetch={level},warcfetch_cli={level}")));

    match log_file {
        Some(path) => {
            let directory = path.parent().unwrap_or_else(|| Path::new("."));
            let filename = path.file_name().ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("log path {} has no file name", path.display()),
                )
            })?;
            let appender = tracing_appender::rolling::never(directory, filename);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}
