//! Contract chunking with page and section provenance.
//!
//! Two modes share the same recursive splitter:
//!
//! - **Flat**: one pass at `chunk_size` / `chunk_overlap`.
//! - **Parent/child**: large parents (`2 × chunk_size`, same overlap) are
//!   each split again into small children (`chunk_size / 2`, half the
//!   overlap). Children are indexed and matched; the parent text travels
//!   with every child as prompt and citation context.

pub mod provenance;
pub mod splitter;

use std::collections::BTreeMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ChunkingConfig;
use crate::document::ContractText;
use provenance::{find_page, find_section};
use splitter::{RecursiveSplitter, SEPARATORS};

pub use provenance::UNKNOWN_SECTION;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkMode {
    Flat,
    #[default]
    ParentChild,
}

/// Unit of retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique within a document: `"<n>"` in flat mode,
    /// `"<parent_id>_<child_index>"` in parent/child mode.
    pub chunk_id: String,
    pub text: String,
    pub parent_id: Option<u32>,
    pub child_index: Option<u32>,
    /// Full text of the containing parent, when chunked in parent/child mode.
    pub parent_text: Option<String>,
    /// 1-based page number.
    pub page: u32,
    pub section: String,
    /// Byte offset of `text` in the concatenated document text.
    pub start: usize,
}

impl Chunk {
    /// Text shown to the oracle and in citation previews.
    #[must_use]
    pub fn context_text(&self) -> &str {
        self.parent_text.as_deref().unwrap_or(&self.text)
    }

    /// Grouping key for context and citation dedup: the parent when there is
    /// one, otherwise the chunk itself.
    #[must_use]
    pub fn group_key(&self) -> String {
        match self.parent_id {
            Some(parent) => format!("p{parent}"),
            None => format!("c{}", self.chunk_id),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    mode: ChunkMode,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    #[must_use]
    pub fn new(mode: ChunkMode, chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            mode,
            chunk_size: chunk_size.max(1),
            chunk_overlap,
        }
    }

    #[must_use]
    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.mode, config.chunk_size, config.chunk_overlap)
    }

    /// Mode and sizes as one string, e.g. `"flat:1500:300"`. Two chunkers
    /// with the same signature cut any document identically.
    #[must_use]
    pub fn signature(&self) -> String {
        let mode = match self.mode {
            ChunkMode::Flat => "flat",
            ChunkMode::ParentChild => "parent_child",
        };
        format!("{mode}:{}:{}", self.chunk_size, self.chunk_overlap)
    }

    /// Chunk a loaded contract.
    #[must_use]
    pub fn chunk(&self, contract: &ContractText) -> Vec<Chunk> {
        self.chunk_text(&contract.full_text, &contract.pages)
    }

    /// Chunk marker-annotated text, attributing pages through `pages`.
    /// Empty input yields no chunks.
    #[must_use]
    pub fn chunk_text(&self, full_text: &str, pages: &BTreeMap<u32, String>) -> Vec<Chunk> {
        let chunks = match self.mode {
            ChunkMode::Flat => self.chunk_flat(full_text, pages),
            ChunkMode::ParentChild => self.chunk_parent_child(full_text, pages),
        };
        debug!(mode = ?self.mode, count = chunks.len(), "chunked document");
        chunks
    }

    fn chunk_flat(&self, full_text: &str, pages: &BTreeMap<u32, String>) -> Vec<Chunk> {
        RecursiveSplitter::new(self.chunk_size, self.chunk_overlap)
            .split(full_text)
            .into_iter()
            .enumerate()
            .map(|(idx, range)| {
                build_chunk(full_text, pages, range, idx.to_string(), None, None, None)
            })
            .collect()
    }

    fn chunk_parent_child(&self, full_text: &str, pages: &BTreeMap<u32, String>) -> Vec<Chunk> {
        let parent_splitter = RecursiveSplitter::new(self.chunk_size * 2, self.chunk_overlap);
        let child_splitter = RecursiveSplitter::new(self.chunk_size / 2, self.chunk_overlap / 2);

        let mut chunks = Vec::new();
        for (parent_id, parent_range) in parent_splitter.split(full_text).into_iter().enumerate() {
            let parent_id = parent_id as u32;
            let parent_text = &full_text[parent_range.clone()];

            for (child_index, child_range) in child_splitter
                .split_range(full_text, parent_range.clone(), &SEPARATORS)
                .into_iter()
                .enumerate()
            {
                let child_index = child_index as u32;
                chunks.push(build_chunk(
                    full_text,
                    pages,
                    child_range,
                    format!("{parent_id}_{child_index}"),
                    Some(parent_id),
                    Some(child_index),
                    Some(parent_text.to_string()),
                ));
            }
        }
        chunks
    }
}

fn build_chunk(
    full_text: &str,
    pages: &BTreeMap<u32, String>,
    range: Range<usize>,
    chunk_id: String,
    parent_id: Option<u32>,
    child_index: Option<u32>,
    parent_text: Option<String>,
) -> Chunk {
    let text = full_text[range.clone()].to_string();
    Chunk {
        page: find_page(&text, pages),
        section: find_section(full_text, range.start),
        chunk_id,
        text,
        parent_id,
        child_index,
        parent_text,
        start: range.start,
    }
}
