use std::fs;
use std::path::Path;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::error::{AugMixError, Result};
use crate::run::config::RunConfig;
use crate::run::run_log::RunLog;

pub const RUN_CONFIG_FILE: &str = "run_config.json";

/// Per-run state shared by training and evaluation: the configuration, the
/// single seeded random generator, and the output directory with its log.
pub struct RunContext {
    pub config: RunConfig,
    rng: ChaCha8Rng,
    run_log: Option<RunLog>,
}

impl RunContext {
    pub fn new(config: RunConfig) -> Result<RunContext> {
        config.validate()?;
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Ok(RunContext { config, rng, run_log: None })
    }

    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    pub fn save_dir(&self) -> &Path {
        &self.config.save
    }

    /// Creates the save directory, records the configuration and opens the
    /// run log (continuing it when `resuming`).
    pub fn prepare_outputs(&mut self, resuming: bool) -> Result<()> {
        let save = self.config.save.clone();
        if !save.exists() {
            fs::create_dir_all(&save).map_err(|e| AugMixError::file(&save, e))?;
        }
        if !save.is_dir() {
            return Err(AugMixError::Config(format!("{} is not a dir", save.display())));
        }

        self.config.save_json(&save.join(RUN_CONFIG_FILE))?;

        let log_path = self.config.log_path();
        let log = if resuming { RunLog::resume(&log_path)? } else { RunLog::create(&log_path)? };
        info!(save = %save.display(), log = %log_path.display(), "Run outputs ready");
        self.run_log = Some(log);
        Ok(())
    }

    pub fn run_log(&self) -> Result<&RunLog> {
        self.run_log
            .as_ref()
            .ok_or_else(|| AugMixError::Config("run outputs were not prepared".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_path_that_is_a_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("snapshots");
        fs::write(&file, b"not a directory").unwrap();
        let mut ctx = RunContext::new(RunConfig { save: file, ..RunConfig::default() }).unwrap();
        let err = ctx.prepare_outputs(false).unwrap_err();
        assert!(err.to_string().contains("is not a dir"));
    }

    #[test]
    fn test_outputs_are_created() {
        let dir = tempfile::tempdir().unwrap();
        let save = dir.path().join("nested").join("snapshots");
        let mut ctx = RunContext::new(RunConfig { save: save.clone(), ..RunConfig::default() }).unwrap();
        ctx.prepare_outputs(false).unwrap();
        assert!(save.join(RUN_CONFIG_FILE).is_file());
        assert!(ctx.run_log().unwrap().path().is_file());
    }
}
