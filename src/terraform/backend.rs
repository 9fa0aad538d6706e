//! Backend block detection
//!
//! A lightweight matcher over raw `.tf` text, not an HCL parser. Line comments
//! are stripped first, but a `backend` inside a `/* */` comment within a
//! `terraform` block still counts as a backend, as do braces inside strings.

use crate::core::PipelineError;
use regex::Regex;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Finds `terraform { ... backend "<type>" { ... } ... }`
pub struct BackendMatcher {
    terraform_open: Regex,
    backend_open: Regex,
}

impl BackendMatcher {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            terraform_open: Regex::new(r"(?m)^\s*terraform\s*\{")?,
            backend_open: Regex::new(r#"backend\s+"[^"]+"\s*\{"#)?,
        })
    }

    /// Whether `text` declares a backend inside a terraform block
    pub fn has_backend_block(&self, text: &str) -> bool {
        let text = strip_line_comments(text);
        self.terraform_open.find_iter(&text).any(|open| {
            block_body(&text[open.end()..])
                .map(|body| self.backend_open.is_match(body))
                .unwrap_or(false)
        })
    }
}

fn strip_line_comments(text: &str) -> String {
    text.lines()
        .map(|line| {
            let trimmed = line.trim_start();
            if trimmed.starts_with('#') || trimmed.starts_with("//") {
                ""
            } else {
                line
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text up to the brace closing an already opened block
fn block_body(rest: &str) -> Option<&str> {
    let mut depth = 1usize;
    for (idx, ch) in rest.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&rest[..idx]);
                }
            }
            _ => {}
        }
    }
    None
}

/// `*.tf` files under `dir`, sorted; hidden directories such as `.terraform`
/// are not entered
pub fn find_tf_files(dir: &Path, recursive: bool) -> Vec<PathBuf> {
    let mut walker = WalkDir::new(dir).min_depth(1);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files: Vec<PathBuf> = walker
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        .flatten()
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().and_then(|ext| ext.to_str()) == Some("tf"))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

/// Whether any `*.tf` file under `dir` declares a backend
pub async fn scan_for_backend(dir: &Path) -> Result<bool, PipelineError> {
    let matcher = BackendMatcher::new()
        .map_err(|e| PipelineError::config(format!("Backend pattern: {}", e)))?;

    for file in find_tf_files(dir, true) {
        let text = tokio::fs::read_to_string(&file).await?;
        if matcher.has_backend_block(&text) {
            tracing::debug!("Backend block found in {}", file.display());
            return Ok(true);
        }
    }
    Ok(false)
}
