//! The download run.

use std::sync::Arc;

use tracing::info;
use warcfetch::{
    CoordinatorConfig, DownloadCoordinator, InventoryClient, ManifestStore, RetryPolicy, RunError,
    RunReport,
};

use super::common::format_bytes;
use super::Resolved;
use crate::error::CliError;
use crate::progress::ProgressRenderer;

/// Run the coordinator and print the report.
///
/// Returns the process exit code: zero only when every matched file is
/// completed or skipped.
pub async fn run(client: InventoryClient, resolved: &Resolved) -> Result<i32, CliError> {
    let manifest = Arc::new(ManifestStore::open(&resolved.manifest)?);
    info!(
        manifest = %resolved.manifest.display(),
        known = manifest.len(),
        "manifest opened"
    );

    let mut config = CoordinatorConfig::default();
    if let Some(concurrency) = resolved.concurrency {
        config.concurrency = concurrency.max(1);
    }
    if let Some(retries) = resolved.retries {
        config.retry = RetryPolicy {
            max_attempts: retries.max(1),
            ..RetryPolicy::default()
        };
    }

    let renderer = ProgressRenderer::new();
    let coordinator =
        DownloadCoordinator::new(client, &resolved.destination, manifest, config)
            .with_progress(renderer.callback());

    // Ctrl-C stops dispatch and interrupts in-flight transfers; their
    // partial files stay behind for the next run to resume.
    let cancel = coordinator.cancellation_token();
    if let Err(err) = ctrlc::set_handler(move || cancel.cancel()) {
        return Err(CliError::Config(format!(
            "could not install interrupt handler: {err}"
        )));
    }

    let result = coordinator.run(&resolved.filter).await;
    renderer.clear();

    match result {
        Ok(report) => {
            print_report(&report);
            Ok(if report.is_success() { 0 } else { 1 })
        }
        Err(RunError::Enumeration { source, partial }) => {
            print_report(&partial);
            eprintln!("error: enumeration aborted: {source}");
            Ok(1)
        }
        Err(err) => Err(err.into()),
    }
}

fn print_report(report: &RunReport) {
    println!();
    println!("Completed: {}", report.completed);
    println!("Skipped:   {}", report.skipped);
    println!("Failed:    {}", report.failed_count());
    println!("Downloaded: {}", format_bytes(report.bytes_downloaded));
    if report.interrupted {
        println!("Run interrupted; partial files were kept for resume.");
    }
    if !report.failed.is_empty() {
        println!();
        println!("Failed files:");
        for failure in &report.failed {
            println!(
                "  {} ({} attempts): {}",
                failure.filename, failure.attempts, failure.reason
            );
        }
    }
}
