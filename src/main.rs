// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Result, anyhow, Context};
use log::{info, LevelFilter, Log, Metadata, Record, Level, SetLoggerError};
use std::path::PathBuf;
use std::io::Write;
use clap::{Args, Parser, ValueEnum, CommandFactory, Subcommand};
use clap_complete::{generate, Shell};

use llm_translator::app_config::{self, Config, TranslationProvider};
use llm_translator::app_controller::{Controller, FileOutcome};
use llm_translator::translation::{FailurePolicy, OversizedPolicy};

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    Ollama,
    Vllm,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::Ollama => TranslationProvider::Ollama,
            CliTranslationProvider::Vllm => TranslationProvider::Vllm,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate a Markdown file or every Markdown file in a directory (default command)
    Translate(TranslateArgs),

    /// Show paragraph and request length statistics without translating
    Stats(StatsArgs),

    /// Generate shell completions for llm-translator
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Settings shared by every command that loads the configuration
#[derive(Args, Debug, Clone)]
struct ConfigArgs {
    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Generation backend to use
    #[arg(short, long, value_enum)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// Backend URL
    #[arg(long, env = "LLM_TRANSLATOR_ENDPOINT")]
    endpoint: Option<String>,

    /// Source language code (e.g., 'en')
    #[arg(short, long)]
    source_language: Option<String>,

    /// Target language code (e.g., 'ja')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Preceding units sent as context
    #[arg(long)]
    num_context: Option<usize>,

    /// Context length of the model in tokens
    #[arg(long)]
    max_total_length: Option<usize>,

    /// Share of the context length one unit may take
    #[arg(long)]
    budget_ratio: Option<f64>,

    /// Total generation attempts per unit
    #[arg(long)]
    num_retry: Option<u32>,

    /// Sentences over budget: emit, fail or force-split
    #[arg(long)]
    oversized_policy: Option<OversizedPolicy>,

    /// Failed units: abort or keep-original
    #[arg(long)]
    failure_policy: Option<FailurePolicy>,

    /// Term to keep untranslated (repeatable)
    #[arg(long = "keep-term", value_name = "TERM")]
    keep_terms: Vec<String>,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

#[derive(Args, Debug)]
struct TranslateArgs {
    /// Input Markdown file or directory to process
    #[arg(value_name = "INPUT_PATH")]
    input_path: PathBuf,

    /// Force overwrite of existing output files
    #[arg(short, long)]
    force_overwrite: bool,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Args, Debug)]
struct StatsArgs {
    /// Input Markdown file
    #[arg(value_name = "INPUT_FILE")]
    input_file: PathBuf,

    #[command(flatten)]
    config: ConfigArgs,
}

/// llm-translator - context-aware Markdown translation with local LLMs
///
/// Splits a Markdown document into paragraphs and budget-sized units and
/// translates them one by one, with preceding units as context.
#[derive(Parser, Debug)]
#[command(name = "llm-translator")]
#[command(version)]
#[command(about = "Context-aware Markdown translation with local LLMs")]
#[command(args_conflicts_with_subcommands = true)]
#[command(long_about = "llm-translator translates long Markdown documents such as research papers with a local LLM.

EXAMPLES:
    llm-translator paper.md                          # Translate using default config (writes paper_ja.md)
    llm-translator -f paper.md                       # Force overwrite existing files
    llm-translator -p vllm -m Qwen/Qwen2.5-7B-Instruct paper.md
    llm-translator --num-context 4 --budget-ratio 0.25 paper.md
    llm-translator --keep-term LoRA --keep-term RLHF paper.md
    llm-translator --log-level debug papers/         # Process entire directory with debug logging
    llm-translator stats paper.md                    # Show length statistics
    llm-translator completions bash > llm-translator.bash

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically.

SUPPORTED PROVIDERS:
    ollama - Local Ollama server (default: qwen2.5:7b on http://localhost:11434)
    vllm   - OpenAI-compatible completions server (default: http://localhost:8000/v1)")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input Markdown file or directory to process
    #[arg(value_name = "INPUT_PATH")]
    input_path: Option<PathBuf>,

    /// Force overwrite of existing output files
    #[arg(short, long)]
    force_overwrite: bool,

    #[command(flatten)]
    config: ConfigArgs,
}

// @struct: Custom logger implementation
struct CustomLogger;

impl CustomLogger {
    // @initializes: Global logger, filtering through the max level only
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji for log level
    fn get_emoji_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "❌ ",
            Level::Warn => "🚧 ",
            Level::Info => " ",
            Level::Debug => "🔍 ",
            Level::Trace => "📋 ",
        }
    }

    // @returns: ANSI color for log level
    fn get_color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let _ = writeln!(
                std::io::stderr(),
                "{}{} {} {}\x1B[0m",
                Self::get_color_for_level(record.level()),
                now,
                Self::get_emoji_for_level(record.level()),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Info until the config says otherwise
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "llm-translator", &mut std::io::stdout());
            Ok(())
        }
        Some(Commands::Translate(args)) => run_translate(args).await,
        Some(Commands::Stats(args)) => run_stats(args),
        None => {
            let input_path = cli.input_path.ok_or_else(|| {
                anyhow!("INPUT_PATH is required when no subcommand is specified")
            })?;

            run_translate(TranslateArgs {
                input_path,
                force_overwrite: cli.force_overwrite,
                config: cli.config,
            }).await
        }
    }
}

/// Load the configuration file, apply CLI overrides and the log level
fn load_config(options: &ConfigArgs) -> Result<Config> {
    if let Some(cmd_log_level) = &options.log_level {
        let level: app_config::LogLevel = cmd_log_level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    let mut config = Config::load_or_create(&options.config_path)?;

    if let Some(provider) = &options.provider {
        config.translation.provider = provider.clone().into();
    }
    if let Some(model) = &options.model {
        config.translation.active_provider_config_mut().model = model.clone();
    }
    if let Some(endpoint) = &options.endpoint {
        config.translation.active_provider_config_mut().endpoint = endpoint.clone();
    }
    if let Some(source_lang) = &options.source_language {
        config.source_language = source_lang.clone();
    }
    if let Some(target_lang) = &options.target_language {
        config.target_language = target_lang.clone();
    }

    let segmentation = &mut config.translation.segmentation;
    if let Some(num_context) = options.num_context {
        segmentation.num_context = num_context;
    }
    if let Some(max_total_length) = options.max_total_length {
        segmentation.max_total_length = max_total_length;
    }
    if let Some(budget_ratio) = options.budget_ratio {
        segmentation.budget_ratio = budget_ratio;
    }
    if let Some(policy) = options.oversized_policy {
        segmentation.oversized_policy = policy;
    }

    let common = &mut config.translation.common;
    if let Some(num_retry) = options.num_retry {
        common.num_retry = num_retry;
    }
    if let Some(policy) = options.failure_policy {
        common.failure_policy = policy;
    }
    common.keep_terms.extend(options.keep_terms.iter().cloned());

    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    }

    config.validate()
        .context("Configuration validation failed")?;

    if options.log_level.is_none() {
        log::set_max_level(config.log_level.to_level_filter());
    }

    Ok(config)
}

async fn run_translate(options: TranslateArgs) -> Result<()> {
    let config = load_config(&options.config)?;
    let controller = Controller::with_config(config)?;

    controller.test_connection().await?;

    let input_path = options.input_path;
    if input_path.is_dir() {
        let summary = controller
            .run_until_interrupted(controller.run_folder(input_path, options.force_overwrite))
            .await?;
        if summary.failed > 0 {
            return Err(anyhow!("{} file(s) failed to translate", summary.failed));
        }
    } else {
        let output_dir = input_path.parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        let outcome = controller
            .run_until_interrupted(controller.run(input_path, output_dir, options.force_overwrite))
            .await?;
        if let FileOutcome::Translated(path) = outcome {
            info!("Wrote {}", path.display());
        }
    }

    Ok(())
}

fn run_stats(options: StatsArgs) -> Result<()> {
    let config = load_config(&options.config)?;
    let controller = Controller::with_config(config)?;

    let stats = controller.statistics(&options.input_file)?;
    println!("{}", stats);
    Ok(())
}
