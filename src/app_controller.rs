use anyhow::{anyhow, Context, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app_config::{Config, TranslationProvider};
use crate::file_utils::FileManager;
use crate::providers::ollama::Ollama;
use crate::providers::vllm::Vllm;
use crate::providers::Provider;
use crate::translation::{
    CancellationFlag, Document, DocumentStatistics, HeuristicTokenizer, TranslatedDocument, Translator,
};

// @module: Application controller for Markdown document translation

/// What happened to one input file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Translation written to the given path
    Translated(PathBuf),
    /// Output already existed and was left alone
    Skipped(PathBuf),
}

/// Counts for a folder run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FolderSummary {
    pub translated: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Main application controller for document translation
pub struct Controller {
    // @field: App configuration
    config: Config,

    // @field: Generation backend shared by all documents
    provider: Arc<dyn Provider>,

    // @field: Set on Ctrl-C, checked before every unit
    cancellation: CancellationFlag,
}

impl Controller {
    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        let provider = Self::build_provider(&config)?;
        Ok(Self::with_provider(config, provider))
    }

    /// Create a controller around an existing provider
    pub fn with_provider(config: Config, provider: Arc<dyn Provider>) -> Self {
        Self {
            config,
            provider,
            cancellation: CancellationFlag::new(),
        }
    }

    // @creates: Backend client for the configured provider
    fn build_provider(config: &Config) -> Result<Arc<dyn Provider>> {
        let translation = &config.translation;
        let endpoint = translation.get_endpoint();
        let model = translation.get_model();
        let timeout_secs = translation.get_timeout_secs();

        let provider: Arc<dyn Provider> = match translation.provider {
            TranslationProvider::Ollama => {
                let mut ollama = Ollama::new(&endpoint, model, timeout_secs)
                    .context("Failed to create Ollama client")?;
                if let Some(num_ctx) = translation.get_active_provider_config().and_then(|p| p.num_ctx) {
                    ollama = ollama.with_num_ctx(num_ctx);
                }
                Arc::new(ollama)
            }
            TranslationProvider::Vllm => Arc::new(
                Vllm::new(&endpoint, model, translation.get_api_key(), timeout_secs)
                    .context("Failed to create vLLM client")?,
            ),
        };

        Ok(provider)
    }

    /// The active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Flag that stops the current document before its next unit
    pub fn cancellation(&self) -> &CancellationFlag {
        &self.cancellation
    }

    /// Check that the backend answers
    pub async fn test_connection(&self) -> Result<()> {
        self.provider.test_connection().await.with_context(|| {
            format!(
                "Cannot reach {} at {}",
                self.config.translation.provider.display_name(),
                self.config.translation.get_endpoint()
            )
        })
    }

    fn build_translator(&self) -> Translator {
        Translator::new(
            self.config.translator_config(),
            Arc::clone(&self.provider),
            Arc::new(HeuristicTokenizer::new()),
        )
        .with_cancellation(self.cancellation.clone())
    }

    fn progress_style(unit: &str) -> ProgressStyle {
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {} ({{percent}}%) {{msg}} {{eta}}",
                unit
            ))
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░")
    }

    /// Translate Markdown text, reporting unit progress on the given bar
    pub async fn translate_text(&self, content: &str, progress_bar: Option<ProgressBar>) -> Result<TranslatedDocument> {
        let document = Document::new(content);
        let mut translator = self.build_translator();

        match translator.statistics(&document) {
            Ok(stats) => {
                for line in stats.to_string().lines() {
                    info!("{}", line);
                }
            }
            Err(e) => warn!("Could not compute document statistics: {}", e),
        }

        if let Some(pb) = progress_bar {
            translator = translator.with_progress(move |completed, total| {
                pb.set_length(total as u64);
                pb.set_position(completed as u64);
            });
        }

        let translated = translator.translate(&document).await?;
        Ok(translated)
    }

    /// Translate one Markdown file into `output_dir`
    pub async fn run(&self, input_file: PathBuf, output_dir: PathBuf, force_overwrite: bool) -> Result<FileOutcome> {
        let multi_progress = MultiProgress::new();
        self.run_with_progress(&input_file, &output_dir, &multi_progress, force_overwrite).await
    }

    async fn run_with_progress(
        &self,
        input_file: &Path,
        output_dir: &Path,
        multi_progress: &MultiProgress,
        force_overwrite: bool,
    ) -> Result<FileOutcome> {
        let start_time = std::time::Instant::now();

        if !FileManager::file_exists(input_file) {
            return Err(anyhow!("Input file does not exist: {:?}", input_file));
        }

        FileManager::ensure_dir(output_dir)?;

        let output_path = FileManager::generate_output_path(input_file, output_dir, &self.config.target_language);
        if output_path.exists() && !force_overwrite {
            warn!("Skipping {}, translation already exists (use -f to force overwrite)", input_file.display());
            return Ok(FileOutcome::Skipped(output_path));
        }

        let content = FileManager::read_to_string(input_file)?;

        info!("🚀 llm-translator: {} - {}",
            self.config.translation.provider.display_name(),
            self.config.translation.get_model());
        info!("Translating {}", input_file.display());

        let progress_bar = multi_progress.add(ProgressBar::new(0));
        progress_bar.set_style(Self::progress_style("units"));
        progress_bar.set_message("Translating");

        let result = self.translate_text(&content, Some(progress_bar.clone())).await;
        progress_bar.finish_and_clear();

        let translated = result.with_context(|| format!("Failed to translate {}", input_file.display()))?;

        if !translated.report.is_complete() {
            warn!("Units kept in the source language: {:?}", translated.report.failed_units);
        }
        info!("🔢 {}", translated.report.summary());

        FileManager::write_to_file(&output_path, &translated.text)?;
        info!("Success: {} ({})", output_path.display(), Self::format_duration(start_time.elapsed()));

        Ok(FileOutcome::Translated(output_path))
    }

    /// Translate every Markdown file in a directory, next to its source
    /// Files that already have a translation are skipped
    pub async fn run_folder(&self, input_dir: PathBuf, force_overwrite: bool) -> Result<FolderSummary> {
        let start_time = std::time::Instant::now();

        if !FileManager::dir_exists(&input_dir) {
            return Err(anyhow!("Input directory does not exist: {:?}", input_dir));
        }

        let files = FileManager::find_markdown_files(&input_dir, &self.config.target_language)?;
        if files.is_empty() {
            return Err(anyhow!("No Markdown files found in directory: {:?}", input_dir));
        }

        let multi_progress = MultiProgress::new();
        let folder_pb = multi_progress.add(ProgressBar::new(files.len() as u64));
        folder_pb.set_style(Self::progress_style("files"));
        folder_pb.set_message("Processing files");

        let mut summary = FolderSummary::default();

        for file in &files {
            if self.cancellation.is_cancelled() {
                break;
            }

            let file_name = file.file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            folder_pb.set_message(format!("Processing: {}", file_name));

            let output_dir = file.parent().map(Path::to_path_buf).unwrap_or_else(|| input_dir.clone());

            match self.run_with_progress(file, &output_dir, &multi_progress, force_overwrite).await {
                Ok(FileOutcome::Translated(_)) => summary.translated += 1,
                Ok(FileOutcome::Skipped(_)) => summary.skipped += 1,
                Err(e) => {
                    error!("{}: {:#}", file_name, e);
                    summary.failed += 1;
                }
            }
            folder_pb.inc(1);
        }

        folder_pb.finish_and_clear();
        info!("Folder done in {}: {} translated, {} skipped, {} failed",
            Self::format_duration(start_time.elapsed()),
            summary.translated, summary.skipped, summary.failed);

        Ok(summary)
    }

    /// Length statistics for a file under the current settings
    pub fn statistics(&self, input_file: &Path) -> Result<DocumentStatistics> {
        let content = FileManager::read_to_string(input_file)?;
        let stats = self.build_translator()
            .statistics(&Document::new(content))
            .with_context(|| format!("Failed to chunk {}", input_file.display()))?;
        Ok(stats)
    }

    /// Drive a run, cancelling it cleanly on Ctrl-C.
    ///
    /// The first Ctrl-C sets the cancellation flag so the run stops before
    /// its next unit without writing partial output. A second Ctrl-C drops
    /// the run together with the generation call in flight.
    pub async fn run_until_interrupted<T, F>(&self, run: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.run_until_signalled(run, tokio::signal::ctrl_c).await
    }

    /// Drive a run against an arbitrary interrupt source.
    ///
    /// `interrupt` is called once per expected signal; see
    /// [`Controller::run_until_interrupted`].
    pub async fn run_until_signalled<T, F, S, Fut>(&self, run: F, mut interrupt: S) -> Result<T>
    where
        F: Future<Output = Result<T>>,
        S: FnMut() -> Fut,
        Fut: Future<Output = std::io::Result<()>>,
    {
        tokio::pin!(run);

        tokio::select! {
            result = &mut run => return result,
            signal = interrupt() => {
                if let Err(e) = signal {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                    return run.await;
                }
                warn!("Interrupted, stopping after the current unit (Ctrl-C again to abort now)");
                self.cancellation.cancel();
            }
        }

        tokio::select! {
            result = &mut run => result,
            signal = interrupt() => {
                if let Err(e) = signal {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                    return run.await;
                }
                error!("Interrupted again, abandoning the unit in flight");
                Err(anyhow!("Translation aborted by a second interrupt"))
            }
        }
    }

    // Format duration in a human-readable format
    fn format_duration(duration: std::time::Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}
