//! Query-only modes: `--count` and `--size`.

use warcfetch::InventoryClient;

use super::common::format_bytes;
use super::Resolved;
use crate::error::CliError;

/// Print the number of matching files.
pub async fn count(client: &InventoryClient, resolved: &Resolved) -> Result<(), CliError> {
    match client.count(&resolved.filter).await? {
        Some(count) => println!("Number of Files: {count}"),
        None => println!("Number of Files: unknown (access point reports no count)"),
    }
    Ok(())
}

/// Print the number and combined size of matching files.
pub async fn size(client: &InventoryClient, resolved: &Resolved) -> Result<(), CliError> {
    let (files, bytes) = client.total_size(&resolved.filter).await?;
    println!("Number of Files: {files}");
    println!("Size of Files: {}", format_bytes(bytes));
    Ok(())
}
