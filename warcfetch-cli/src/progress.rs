//! Terminal progress rendering.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use warcfetch::TransferProgress;

/// One progress bar per in-flight transfer.
///
/// Bars appear on the first progress event for a file and disappear once
/// its bytes reach the expected size. Log lines continue to work because
/// the tracing output goes to stderr below the bars.
pub struct ProgressRenderer {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl ProgressRenderer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
        })
    }

    /// Callback handed to the download coordinator.
    pub fn callback(self: &Arc<Self>) -> TransferProgress {
        let renderer = Arc::clone(self);
        Arc::new(move |filename: &str, downloaded: u64, total: u64| {
            renderer.update(filename, downloaded, total);
        })
    }

    fn update(&self, filename: &str, downloaded: u64, total: u64) {
        let mut bars = self.bars.lock().expect("progress lock poisoned");
        let bar = bars.entry(filename.to_string()).or_insert_with(|| {
            let bar = self.multi.add(ProgressBar::new(total.max(downloaded)));
            bar.set_style(
                ProgressStyle::with_template(
                    "{msg:30!} [{bar:30}] {bytes}/{total_bytes} ({bytes_per_sec})",
                )
                .expect("valid progress template")
                .progress_chars("=> "),
            );
            bar.set_message(filename.to_string());
            bar
        });
        bar.set_position(downloaded);

        if total > 0 && downloaded >= total {
            bar.finish_and_clear();
            self.multi.remove(bar);
            bars.remove(filename);
        }
    }

    /// Clear any bars left behind by failed or cancelled transfers.
    pub fn clear(&self) {
        let mut bars = self.bars.lock().expect("progress lock poisoned");
        for (_, bar) in bars.drain() {
            bar.finish_and_clear();
        }
        let _ = self.multi.clear();
    }
}
