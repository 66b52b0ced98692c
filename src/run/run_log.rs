use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{AugMixError, Result};
use crate::train::epoch_stats::EpochStats;

pub const RUN_LOG_HEADER: &str = "epoch,time(s),train_loss,test_loss,test_error(%)";

/// Append-only CSV record of a run: one row per epoch, then a trailing row
/// holding the mean corruption error.
#[derive(Debug, Clone)]
pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    /// Starts a new log, truncating any existing file.
    pub fn create(path: &Path) -> Result<RunLog> {
        let mut file = File::create(path).map_err(|e| AugMixError::file(path, e))?;
        writeln!(file, "{}", RUN_LOG_HEADER).map_err(|e| AugMixError::file(path, e))?;
        Ok(RunLog { path: path.to_path_buf() })
    }

    /// Continues an existing log, or starts one if there is none.
    pub fn resume(path: &Path) -> Result<RunLog> {
        if path.is_file() {
            Ok(RunLog { path: path.to_path_buf() })
        } else {
            RunLog::create(path)
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append_epoch(&self, stats: &EpochStats) -> Result<()> {
        self.append(&format_row(
            stats.epoch + 1,
            stats.elapsed_secs,
            stats.train_loss,
            stats.test_loss,
            stats.test_error_pct(),
        ))
    }

    /// The row after the last epoch: `epochs + 1` and the corruption error.
    pub fn append_summary(&self, epochs: usize, test_c_acc: f64) -> Result<()> {
        self.append(&format_row(epochs + 1, 0, 0.0, 0.0, 100.0 - 100.0 * test_c_acc))
    }

    fn append(&self, row: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| AugMixError::file(&self.path, e))?;
        writeln!(file, "{}", row).map_err(|e| AugMixError::file(&self.path, e))
    }
}

/// `%03d,%05d,%0.6f,%0.5f,%0.2f`
pub fn format_row(epoch: usize, secs: u64, train_loss: f64, test_loss: f64, test_error: f64) -> String {
    format!("{:03},{:05},{:.6},{:.5},{:.2}", epoch, secs, train_loss, test_loss, test_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_follow_the_csv_layout() {
        assert_eq!(format_row(7, 42, 0.5, 1.25, 37.5), "007,00042,0.500000,1.25000,37.50");
    }

    #[test]
    fn test_log_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cifar10_mlp_training_log.csv");
        let log = RunLog::create(&path).unwrap();
        log.append_epoch(&EpochStats { epoch: 0, elapsed_secs: 3, train_loss: 2.0, test_loss: 1.5, test_acc: 0.25 })
            .unwrap();
        log.append_summary(1, 0.5).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec![RUN_LOG_HEADER, "001,00003,2.000000,1.50000,75.00", "002,00000,0.000000,0.00000,50.00"]);

        // Resuming keeps what is there.
        let resumed = RunLog::resume(&path).unwrap();
        resumed.append_summary(1, 1.0).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 4);
    }
}
