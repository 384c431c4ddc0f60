use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// A simple wall-clock timer for logging elapsed time.
pub struct Timer {
    label: String,
    start: Instant,
}

impl Timer {
    pub fn start(label: impl Into<String>) -> Self {
        let label = label.into();
        info!("⏱  Starting: {}", label);
        Self {
            label,
            start: Instant::now(),
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        info!(
            "⏱  Finished: {} (took {:.2?})",
            self.label,
            self.start.elapsed()
        );
    }
}

/// Worker count for I/O-bound fan-out: `min(32, cpus + 4)`.
pub fn default_pool_size() -> usize {
    (num_cpus::get() + 4).min(32)
}

/// `{logs_dir}/stock_scraper_YYYYmmdd_HHMMSS.log`
pub fn log_file_path(logs_dir: &Path, now: DateTime<Local>) -> PathBuf {
    logs_dir.join(format!("stock_scraper_{}.log", now.format("%Y%m%d_%H%M%S")))
}

/// `{data_dir}/output_YYYYmmdd.csv`
pub fn output_file_path(data_dir: &Path, now: DateTime<Local>) -> PathBuf {
    data_dir.join(format!("output_{}.csv", now.format("%Y%m%d")))
}
