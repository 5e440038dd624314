//! Command implementations.
//!
//! The CLI has one implicit command (download everything the filter
//! matches) plus the two query-only modes `--count` and `--size`.

pub mod common;
pub mod download;
pub mod info;

use std::path::PathBuf;

use warcfetch::{ConfigFile, Credentials, InventoryClient, QueryFilter, RetryPolicy};

use crate::args::{Cli, DEFAULT_BASE_URI};
use crate::error::CliError;

/// Settings after merging flags over the config file.
#[derive(Debug)]
pub struct Resolved {
    pub base_uri: String,
    pub destination: PathBuf,
    pub manifest: PathBuf,
    pub concurrency: Option<usize>,
    pub retries: Option<u32>,
    pub filter: QueryFilter,
}

/// Merge CLI flags over config file values; flags win.
pub fn resolve(cli: &Cli, config: &ConfigFile) -> Resolved {
    let base_uri = cli
        .base_uri
        .clone()
        .or_else(|| config.api.base_uri.clone())
        .unwrap_or_else(|| DEFAULT_BASE_URI.to_string());

    let destination = cli
        .destination
        .clone()
        .or_else(|| config.downloads.destination.clone())
        .unwrap_or_else(|| PathBuf::from("."));

    let manifest = cli
        .manifest
        .clone()
        .unwrap_or_else(|| destination.join("manifest.jsonl"));

    let mut filter = cli.to_filter();
    if cli.page_size.is_none() {
        if let Some(size) = config.downloads.page_size {
            filter = filter.with_page_size(size);
        }
    }

    Resolved {
        base_uri,
        destination,
        manifest,
        concurrency: cli.concurrency.or(config.downloads.concurrency),
        retries: cli.retries.or(config.downloads.retries),
        filter,
    }
}

/// Build the inventory client, prompting for a password when a username
/// was supplied.
pub fn build_client(
    resolved: &Resolved,
    username: Option<&str>,
) -> Result<InventoryClient, CliError> {
    let mut client = InventoryClient::new(resolved.base_uri.clone())
        .map_err(|e| CliError::Config(e.to_string()))?;

    if let Some(username) = username {
        let password = dialoguer::Password::new()
            .with_prompt(format!("Password for {username}"))
            .interact()?;
        client = client.with_credentials(Credentials {
            username: username.to_string(),
            password,
        });
    }

    if let Some(retries) = resolved.retries {
        client = client.with_retry_policy(RetryPolicy {
            max_attempts: retries.max(1),
            ..RetryPolicy::default()
        });
    }

    Ok(client)
}
