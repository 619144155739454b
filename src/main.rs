use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use docmover::config::{Config, Provider};
use docmover::extract::ocr::OcrProcessor;
use docmover::pipeline::NoopProgress;
use docmover::provider::anthropic::AnthropicAdapter;
use docmover::provider::deepseek::DeepSeekAdapter;
use docmover::provider::google::GoogleAdapter;
use docmover::provider::local::LocalAdapter;
use docmover::provider::openai::OpenAiAdapter;
use docmover::provider::{Adapter, LlmAdapter};
use docmover::worker;

/// Sorts scanned and OCR'd documents into a destination directory under an
/// LLM-proposed filename, quarantining anything it can't confidently name.
#[derive(Parser, Debug)]
#[command(name = "docmover", version, about)]
struct Cli {
    /// Directory to scan for documents.
    #[arg(long)]
    input_dir: PathBuf,

    /// Directory new files are placed into.
    #[arg(long)]
    destination_dir: PathBuf,

    /// Directory files are moved to when they can't be processed.
    #[arg(long)]
    quarantine_dir: PathBuf,

    /// LLM provider to use: openai, anthropic, google, deepseek, local.
    #[arg(long, default_value = "anthropic")]
    provider: String,

    /// Model name override; each provider has its own default.
    #[arg(long)]
    model: Option<String>,

    /// Tesseract language code(s) for OCR, e.g. "eng" or "eng+fra".
    #[arg(long, default_value = "eng")]
    ocr_language: String,

    /// Discard the progress journal before scanning, reprocessing
    /// everything still present in the input directory.
    #[arg(long)]
    reset_progress: bool,

    /// Per-file retry cap for recoverable failures.
    #[arg(long, default_value_t = 3)]
    max_attempts: u32,

    /// Number of worker threads. Defaults to the available parallelism.
    #[arg(long)]
    worker_count: Option<usize>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_adapter(config: &Config) -> Result<Adapter, String> {
    if config.provider == Provider::Local {
        let model = config.model.clone().unwrap_or_else(|| "llama3".to_string());
        return Ok(Adapter::Local(LocalAdapter::new(model, None)));
    }

    let env_var = config.provider.env_var();
    let api_key = std::env::var(env_var)
        .map_err(|_| format!("missing API key: set {env_var} in the environment"))?;

    let adapter = match config.provider {
        Provider::OpenAi => Adapter::OpenAi(OpenAiAdapter::new(api_key, config.model.clone())),
        Provider::Anthropic => Adapter::Anthropic(AnthropicAdapter::new(api_key, config.model.clone())),
        Provider::Google => Adapter::Google(GoogleAdapter::new(api_key, config.model.clone())),
        Provider::DeepSeek => Adapter::DeepSeek(DeepSeekAdapter::new(api_key, config.model.clone())),
        Provider::Local => unreachable!("handled above"),
    };

    Ok(adapter)
}

fn main() -> ExitCode {
    init_logging();

    let cli = Cli::parse();
    let provider = match Provider::parse(&cli.provider) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let config = Config {
        input_dir: cli.input_dir,
        destination_dir: cli.destination_dir,
        quarantine_dir: cli.quarantine_dir,
        provider,
        model: cli.model,
        ocr_language: cli.ocr_language,
        reset_progress: cli.reset_progress,
        max_attempts: cli.max_attempts,
        worker_count: cli.worker_count.unwrap_or_else(num_cpus::get),
    };

    if let Err(e) = config.validate() {
        eprintln!("invalid configuration: {e}");
        return ExitCode::FAILURE;
    }

    let adapter = match build_adapter(&config) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if !adapter.validate_credentials() {
        eprintln!("credentials for provider '{}' look invalid or unreachable", adapter.name());
        return ExitCode::FAILURE;
    }

    let ocr = Some(OcrProcessor::new(&[config.ocr_language.clone()]));

    worker::batch::install_signal_handler();

    match worker::run_batch(&config, adapter, ocr, Arc::new(NoopProgress)) {
        Ok(summary) => {
            println!(
                "processed {} file(s): {} placed, {} quarantined ({} successful retries across {} file(s))",
                summary.total_files,
                summary.placed,
                summary.quarantined,
                summary.successful_retries,
                summary.unique_files_with_recoverable_issues,
            );
            if docmover::retry::is_cancelled() {
                ExitCode::from(130)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("batch run failed: {e}");
            ExitCode::FAILURE
        }
    }
}
