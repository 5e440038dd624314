//! warcfetch - command-line bulk downloader for WASAPI web archives.

mod args;
mod commands;
mod error;
mod logging;
mod progress;

use clap::Parser;
use tracing::debug;
use warcfetch::ConfigFile;

use args::Cli;
use error::CliError;

fn main() {
    let cli = Cli::parse();

    let _log_guard = match logging::init(cli.verbose, cli.log.as_deref()) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("error: could not open log file: {err}");
            std::process::exit(2);
        }
    };

    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            1
        }
    };
    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Result<i32, CliError> {
    let config = match ConfigFile::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("warning: ignoring config file: {err}");
            ConfigFile::default()
        }
    };

    let resolved = commands::resolve(&cli, &config);
    debug!(?resolved, "resolved settings");

    // Password prompt happens before the runtime starts so it can use the
    // plain blocking terminal.
    let client = commands::build_client(&resolved, cli.user.as_deref())?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        if cli.count {
            commands::info::count(&client, &resolved).await?;
            return Ok(0);
        }
        if cli.size {
            commands::info::size(&client, &resolved).await?;
            return Ok(0);
        }
        commands::download::run(client, &resolved).await
    })
}
