//! Progress UI (indicatif bars) for catalog and download runs.
//!
//! All display lives in the binary; the library reports progress through
//! `TransferObserver` and the catalog page hook.

use bookpull_core::TransferObserver;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// Bar tracking "items collected / N" while the catalog pages in.
pub(crate) fn catalog_bar(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    ProgressBar::new(0).with_style(style("{bar:40} {pos}/{len} books listed"))
}

/// Bar tracking (item, format) pairs across the whole run.
pub(crate) fn items_bar(multi: &MultiProgress, quiet: bool, len: u64) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    multi.add(ProgressBar::new(len).with_style(style("{bar:40} {pos}/{len} {msg}")))
}

/// Byte-level bar for one streaming download, fed by the core's observer
/// seam. Indeterminate totals (no Content-Length) fall back to a spinner.
pub(crate) struct ByteProgress {
    bar: ProgressBar,
}

impl ByteProgress {
    pub(crate) fn new(multi: &MultiProgress, quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            multi.add(
                ProgressBar::no_length()
                    .with_style(style("{bytes}/{total_bytes} {bar:40} {bytes_per_sec}")),
            )
        };
        Self { bar }
    }

    pub(crate) fn finish(self) {
        self.bar.finish_and_clear();
    }
}

impl TransferObserver for ByteProgress {
    fn on_start(&mut self, total_bytes: Option<u64>) {
        match total_bytes {
            Some(total) => self.bar.set_length(total),
            None => self
                .bar
                .set_style(style("{spinner} {bytes} {bytes_per_sec}")),
        }
    }

    fn on_chunk(&mut self, bytes: u64) {
        self.bar.inc(bytes);
    }
}
