//! CLI error type.

use thiserror::Error;

/// Errors surfaced to the terminal before exiting.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Fetch(#[from] warcfetch::FetchError),

    #[error(transparent)]
    Run(#[from] warcfetch::RunError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("could not read password: {0}")]
    Prompt(#[from] dialoguer::Error),
}
