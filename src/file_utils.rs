use anyhow::{Result, Context};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// @module: File and directory utilities

// @const: Extensions treated as Markdown documents
const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown"];

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_file()
    }

    // @checks: Directory existence
    pub fn dir_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_dir()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.as_os_str().is_empty() && !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(())
    }

    // @generates: Output path for a translated document
    // @params: input_file, output_dir, target_language
    // @returns: <output_dir>/<stem>_<target_language>.<ext>
    pub fn generate_output_path<P1: AsRef<Path>, P2: AsRef<Path>>(
        input_file: P1,
        output_dir: P2,
        target_language: &str,
    ) -> PathBuf {
        let input_file = input_file.as_ref();
        let stem = input_file.file_stem().unwrap_or_default().to_string_lossy();
        let extension = input_file
            .extension()
            .map(|ext| ext.to_string_lossy().to_string())
            .unwrap_or_else(|| "md".to_string());

        output_dir
            .as_ref()
            .join(format!("{}_{}.{}", stem, target_language, extension))
    }

    // @checks: Whether a path is a Markdown file this tool produced
    pub fn is_translation_output<P: AsRef<Path>>(path: P, target_language: &str) -> bool {
        let suffix = format!("_{}", target_language);
        path.as_ref()
            .file_stem()
            .map(|stem| stem.to_string_lossy().ends_with(&suffix))
            .unwrap_or(false)
    }

    /// Find Markdown files in a directory, skipping earlier translation outputs
    pub fn find_markdown_files<P: AsRef<Path>>(dir: P, target_language: &str) -> Result<Vec<PathBuf>> {
        let mut result = Vec::new();

        for entry in WalkDir::new(dir.as_ref()).follow_links(true).sort_by_file_name() {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();

            if !path.is_file() {
                continue;
            }
            let is_markdown = path
                .extension()
                .map(|ext| {
                    let ext = ext.to_string_lossy();
                    MARKDOWN_EXTENSIONS.iter().any(|m| ext.eq_ignore_ascii_case(m))
                })
                .unwrap_or(false);

            if !is_markdown {
                continue;
            }
            if Self::is_translation_output(path, target_language) {
                debug!("Skipping {}, its name marks it as a previous `_{}` output", path.display(), target_language);
                continue;
            }
            result.push(path.to_path_buf());
        }

        Ok(result)
    }

    /// Read a file to a string
    pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String> {
        fs::read_to_string(&path)
            .with_context(|| format!("Failed to read file: {:?}", path.as_ref()))
    }

    /// Write a string to a file
    pub fn write_to_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        // Ensure the parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            Self::ensure_dir(parent)?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write to file: {:?}", path.as_ref()))
    }
}
