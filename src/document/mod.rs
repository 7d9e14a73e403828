//! Contract input: page-annotated text ready for chunking.
//!
//! The chunker consumes two views of one document: a `page number → page
//! text` map and a single concatenation where each page is introduced by a
//! `--- Page N ---` marker line.

pub mod pdf;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::info;

use crate::error::{AuditError, Result};

static PAGE_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"--- Page (\d+) ---").expect("valid page marker regex"));

static BLANK_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid blank run regex"));

/// Marker line inserted before each page in the concatenated text.
#[must_use]
pub fn page_marker(page: u32) -> String {
    format!("--- Page {page} ---")
}

/// First page marker found in `text`, if any.
#[must_use]
pub fn find_page_marker(text: &str) -> Option<u32> {
    PAGE_MARKER_RE
        .captures(text)
        .and_then(|caps| caps[1].parse().ok())
}

#[derive(Debug, Clone, Serialize)]
pub struct ContractText {
    /// Display name of the source (usually the file name).
    pub source: String,
    /// Cleaned text per 1-based page number.
    pub pages: BTreeMap<u32, String>,
    /// All pages joined with page markers.
    pub full_text: String,
    /// blake3 hex digest of `full_text`.
    pub fingerprint: String,
}

impl ContractText {
    /// Build from raw per-page text, numbering pages from 1.
    pub fn from_pages<I, S>(source: &str, pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut page_map = BTreeMap::new();
        let mut full_text = String::new();

        for (idx, raw) in pages.into_iter().enumerate() {
            let page_num = idx as u32 + 1;
            let cleaned = clean_page_text(raw.as_ref());
            full_text.push('\n');
            full_text.push_str(&page_marker(page_num));
            full_text.push('\n');
            full_text.push_str(&cleaned);
            page_map.insert(page_num, cleaned);
        }

        let fingerprint = blake3::hash(full_text.as_bytes()).to_hex().to_string();

        Self {
            source: source.to_string(),
            pages: page_map,
            full_text,
            fingerprint,
        }
    }

    /// Load a contract from disk. Supports `.pdf` and plain text (`.txt`),
    /// where form feeds separate pages.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(AuditError::Input(format!(
                "contract file not found: {}",
                path.display()
            )));
        }

        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let pages = match ext.as_str() {
            "pdf" => pdf::extract_pages(path)?,
            "txt" | "text" => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    AuditError::Input(format!("unreadable source {}: {e}", path.display()))
                })?;
                raw.split('\x0c').map(str::to_string).collect()
            }
            other => {
                return Err(AuditError::Input(format!(
                    "unsupported document type '.{other}': expected .pdf or .txt"
                )));
            }
        };

        let contract = Self::from_pages(&source, pages);
        if contract.is_blank() {
            return Err(AuditError::Input(format!(
                "no extractable text in {}",
                path.display()
            )));
        }

        info!(
            "Loaded {} ({} pages, {} chars)",
            contract.source,
            contract.page_count(),
            contract.full_text.len()
        );
        Ok(contract)
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.pages.values().all(|p| p.trim().is_empty())
    }
}

/// Normalize extracted page text while keeping its line structure.
///
/// Control characters are dropped, runs of spaces and tabs collapse to one
/// space, lines are trimmed, and more than one blank line collapses to a
/// single paragraph break.
#[must_use]
pub fn clean_page_text(raw: &str) -> String {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");

    let lines: Vec<String> = normalized
        .lines()
        .map(|line| {
            let visible: String = line
                .chars()
                .filter(|c| !c.is_control() || *c == '\t')
                .collect();
            visible.split_whitespace().collect::<Vec<_>>().join(" ")
        })
        .collect();

    let joined = lines.join("\n");
    BLANK_RUN_RE
        .replace_all(joined.trim(), "\n\n")
        .into_owned()
}
