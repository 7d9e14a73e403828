//! Query-time candidate selection and citation building.
use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::chunker::Chunk;
use crate::error::Result;
use crate::index::ContractIndex;
use crate::llm::Completer;
use crate::models::Citation;

/// Characters of candidate text shown to the relevance scorer.
const RERANK_DOCUMENT_CHARS: usize = 2000;

/// Strategy name as it appears in config files and on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    Similarity,
    Diverse,
    Reranked,
}

impl std::str::FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "similarity" => Ok(Self::Similarity),
            "diverse" | "mmr" => Ok(Self::Diverse),
            "reranked" | "rerank" => Ok(Self::Reranked),
            other => Err(format!(
                "unknown strategy '{other}' (expected similarity, diverse or reranked)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetrievalStrategy {
    /// Nearest neighbours by cosine similarity.
    Similarity,
    /// Maximal marginal relevance over the `fetch_k` nearest candidates.
    Diverse { fetch_k: usize, lambda: f32 },
    /// Similarity over `initial_k` candidates, re-scored by the completion
    /// oracle and averaged with the similarity score.
    Reranked { initial_k: usize },
}

pub struct Retriever<'a> {
    index: &'a ContractIndex,
    scorer: &'a dyn Completer,
}

impl<'a> Retriever<'a> {
    #[must_use]
    pub fn new(index: &'a ContractIndex, scorer: &'a dyn Completer) -> Self {
        Self { index, scorer }
    }

    /// Up to `k` chunks for `query`, best first.
    pub fn retrieve(&self, query: &str, k: usize, strategy: &RetrievalStrategy) -> Result<Vec<Chunk>> {
        let chunks = match *strategy {
            RetrievalStrategy::Similarity => self
                .index
                .query_similar(query, k)?
                .into_iter()
                .map(|(chunk, _)| chunk)
                .collect(),
            RetrievalStrategy::Diverse { fetch_k, lambda } => {
                self.index.query_diverse(query, k, fetch_k, lambda)?
            }
            RetrievalStrategy::Reranked { initial_k } => self.rerank(query, k, initial_k)?,
        };
        debug!(?strategy, k, retrieved = chunks.len(), "retrieval done");
        Ok(chunks)
    }

    fn rerank(&self, query: &str, k: usize, initial_k: usize) -> Result<Vec<Chunk>> {
        let candidates = self.index.query_similar(query, initial_k.max(k))?;

        let mut scored: Vec<(Chunk, f32)> = candidates
            .into_iter()
            .map(|(chunk, similarity)| {
                let prompt = rerank_prompt(query, &chunk.text);
                let combined = match self.scorer.complete(&prompt) {
                    Ok(response) => match parse_score(&response) {
                        Some(score) => (similarity + score / 10.0) / 2.0,
                        None => {
                            debug!("unparseable relevance score {response:?}, using similarity");
                            similarity
                        }
                    },
                    Err(e) => {
                        warn!("relevance scoring failed, using similarity: {e}");
                        similarity
                    }
                };
                (chunk, combined)
            })
            .collect();

        // Stable: equal scores keep similarity order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);
        Ok(scored.into_iter().map(|(chunk, _)| chunk).collect())
    }
}

fn rerank_prompt(query: &str, document: &str) -> String {
    let document: String = document.chars().take(RERANK_DOCUMENT_CHARS).collect();
    format!(
        "You are a legal document relevance scorer.\n\n\
         Query: {query}\n\n\
         Document: {document}\n\n\
         On a scale of 0-10, how relevant is this document to the query?\n\
         Consider:\n\
         - Direct mention of the topic\n\
         - Contextual relevance\n\
         - Legal specificity\n\n\
         Respond with ONLY a number between 0 and 10."
    )
}

/// Relevance score in `0..=10` from a scorer reply such as `"7"`, `"7.5"` or
/// `"8/10"`. Out-of-range or non-numeric replies yield `None`.
pub fn parse_score(response: &str) -> Option<f32> {
    let token = response.split_whitespace().next()?;
    let token = token.split('/').next()?;
    let token = token.trim_matches(|c: char| !c.is_ascii_digit() && c != '.' && c != '-');
    let score: f32 = token.parse().ok()?;
    (score.is_finite() && (0.0..=10.0).contains(&score)).then_some(score)
}

/// Citations for `chunks`, one per `(page, section, parent)` in first-seen
/// order. Previews are the first `preview_chars` characters of the chunk's
/// context text followed by `...`.
#[must_use]
pub fn citations(chunks: &[Chunk], preview_chars: usize) -> Vec<Citation> {
    let mut seen = HashSet::new();
    chunks
        .iter()
        .filter(|c| seen.insert((c.page, c.section.clone(), c.group_key())))
        .map(|c| Citation {
            page: c.page,
            section: c.section.clone(),
            preview: format!(
                "{}...",
                c.context_text().chars().take(preview_chars).collect::<String>()
            ),
        })
        .collect()
}
