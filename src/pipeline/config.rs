use std::path::PathBuf;

use crate::config::Config;

pub struct PipelineConfig {
    pub input_directory: PathBuf,
    pub destination_directory: PathBuf,
    pub quarantine_directory: PathBuf,
    pub max_attempts: u32,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            input_directory: config.input_dir.clone(),
            destination_directory: config.destination_dir.clone(),
            quarantine_directory: config.quarantine_dir.clone(),
            max_attempts: config.max_attempts,
        }
    }
}
