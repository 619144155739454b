//! Run configuration (§6): the fields the CLI surface accepts, validated
//! the way the teacher's config loader validates its JSON documents, minus
//! the rule/variable schema that doesn't apply here.

use std::path::PathBuf;

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Anthropic,
    Google,
    DeepSeek,
    Local,
}

impl Provider {
    pub fn env_var(&self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::Google => "GEMINI_API_KEY",
            Provider::DeepSeek => "DEEPSEEK_API_KEY",
            Provider::Local => "",
        }
    }

    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        match name.to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "anthropic" => Ok(Provider::Anthropic),
            "google" => Ok(Provider::Google),
            "deepseek" => Ok(Provider::DeepSeek),
            "local" => Ok(Provider::Local),
            other => Err(ConfigError::Validation {
                message: format!("unknown provider '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub input_dir: PathBuf,
    pub destination_dir: PathBuf,
    pub quarantine_dir: PathBuf,
    pub provider: Provider,
    pub model: Option<String>,
    pub ocr_language: String,
    pub reset_progress: bool,
    pub max_attempts: u32,
    pub worker_count: usize,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.input_dir.exists() {
            return Err(ConfigError::Validation {
                message: format!("input directory does not exist: {}", self.input_dir.display()),
            });
        }
        if !self.input_dir.is_dir() {
            return Err(ConfigError::Validation {
                message: format!("input path is not a directory: {}", self.input_dir.display()),
            });
        }
        if self.worker_count == 0 {
            return Err(ConfigError::Validation {
                message: "worker_count must be at least 1".to_string(),
            });
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Validation {
                message: "max_attempts must be at least 1".to_string(),
            });
        }
        if same_path(&self.destination_dir, &self.quarantine_dir) {
            return Err(ConfigError::Validation {
                message: "destination_dir and quarantine_dir must differ".to_string(),
            });
        }
        Ok(())
    }

    pub fn journal_path(&self) -> PathBuf {
        self.destination_dir.join(".progress")
    }
}

fn same_path(a: &std::path::Path, b: &std::path::Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
