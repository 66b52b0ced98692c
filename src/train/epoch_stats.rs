use std::fmt;

use serde::{Deserialize, Serialize};

/// Summary of one completed epoch; one run-log row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// 0-based epoch index.
    pub epoch: usize,
    /// Wall-clock seconds the epoch took, training and evaluation included.
    pub elapsed_secs: u64,
    /// Final EMA of the training loss.
    pub train_loss: f64,
    pub test_loss: f64,
    /// Clean test accuracy in `[0, 1]`.
    pub test_acc: f64,
}

impl EpochStats {
    pub fn test_error_pct(&self) -> f64 {
        100.0 - 100.0 * self.test_acc
    }
}

impl fmt::Display for EpochStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Epoch {:3} | Time {:5} | Train Loss {:.4} | Test Loss {:.3} | Test Error {:.2}",
            self.epoch + 1,
            self.elapsed_secs,
            self.train_loss,
            self.test_loss,
            self.test_error_pct()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_console_summary() {
        let stats = EpochStats { epoch: 4, elapsed_secs: 73, train_loss: 1.23456, test_loss: 0.9876, test_acc: 0.8125 };
        assert_eq!(
            stats.to_string(),
            "Epoch   5 | Time    73 | Train Loss 1.2346 | Test Loss 0.988 | Test Error 18.75"
        );
    }
}
