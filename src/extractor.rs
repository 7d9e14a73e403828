//! Prompt assembly and answer classification.
//!
//! The oracle is asked to answer only from retrieved contract text. Whether
//! it actually found anything is decided here by phrase matching on its
//! reply: the instructed sentinel for open questions, and a wider list of
//! refusal and absence phrases for clause extraction.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::chunker::Chunk;
use crate::config::ExtractionConfig;
use crate::error::Result;
use crate::llm::Completer;
use crate::models::{Citation, Confidence, QueryResult};
use crate::retriever::{RetrievalStrategy, Retriever, citations};

/// Phrase whose presence marks an answer as "not found".
pub const NOT_FOUND_SENTINEL: &str = "I don't know";

/// Answer returned when retrieval produced nothing to ask about.
pub const NOT_FOUND_ANSWER: &str =
    "I don't know. I could not find relevant information in the contract to answer this query.";

/// Bumped whenever [`NEGATIVE_PHRASES`] changes.
pub const NEGATIVE_PHRASES_VERSION: u32 = 1;

/// Lowercase phrases that mark an extraction reply as a non-answer.
pub const NEGATIVE_PHRASES: &[&str] = &[
    "i don't know",
    "not found",
    "does not contain",
    "no information",
    "cannot find",
    "i can't assist",
    "i cannot",
    "feel free to ask",
    "different topic",
    "cannot create",
    "without permission",
    "did not provide sufficient",
];

/// Words that downgrade an answer to medium confidence.
pub const HEDGING_TOKENS: &[&str] = &["may", "possibly", "unclear", "ambiguous"];

/// Outcome of one clause extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub found: bool,
    /// Trimmed oracle reply; empty when the oracle was never asked.
    pub answer: String,
    pub citations: Vec<Citation>,
}

impl Extraction {
    fn missing() -> Self {
        Self {
            found: false,
            answer: String::new(),
            citations: Vec::new(),
        }
    }
}

pub struct Extractor<'a> {
    oracle: &'a dyn Completer,
    config: &'a ExtractionConfig,
}

impl<'a> Extractor<'a> {
    #[must_use]
    pub fn new(oracle: &'a dyn Completer, config: &'a ExtractionConfig) -> Self {
        Self { oracle, config }
    }

    /// Answer an open question from `chunks`.
    ///
    /// No chunks means no oracle call: the canonical not-found answer comes
    /// back with no sources.
    pub fn answer(&self, query: &str, chunks: &[Chunk]) -> Result<QueryResult> {
        if chunks.is_empty() {
            debug!("no context retrieved for {query:?}");
            return Ok(QueryResult {
                answer: NOT_FOUND_ANSWER.to_string(),
                sources: Vec::new(),
                confidence: Confidence::None,
            });
        }

        let context = build_context(chunks, self.config.max_context_chars);
        let answer = self.oracle.complete(&qa_prompt(&context, query))?.trim().to_string();
        let confidence = derive_confidence(&answer);
        debug!(?confidence, "answered {query:?}");

        Ok(QueryResult {
            answer,
            sources: citations(chunks, self.config.preview_chars),
            confidence,
        })
    }

    /// Ask the oracle to quote the text answering `task` from `chunks` and
    /// decide whether it found anything.
    pub fn extract(&self, task: &str, chunks: &[Chunk]) -> Result<Extraction> {
        if chunks.is_empty() {
            return Ok(Extraction::missing());
        }

        let context = build_context(chunks, self.config.max_context_chars);
        let answer = self
            .oracle
            .complete(&extraction_prompt(&context, task))?
            .trim()
            .to_string();
        let cites = citations(chunks, self.config.preview_chars);
        let found = is_found(&answer, &cites, self.config.min_content_chars);

        Ok(Extraction {
            found,
            answer,
            citations: cites,
        })
    }

    /// Retrieve and extract one clause type. With query variants enabled the
    /// phrasings are tried in order and the first found answer wins.
    pub fn extract_clause(
        &self,
        clause_type: &str,
        retriever: &Retriever<'_>,
        k: usize,
        strategy: &RetrievalStrategy,
    ) -> Result<Extraction> {
        let queries = if self.config.query_variants {
            clause_queries(clause_type)
        } else {
            clause_queries(clause_type).into_iter().take(1).collect()
        };

        let mut last = Extraction::missing();
        for query in &queries {
            let chunks = retriever.retrieve(query, k, strategy)?;
            let extraction = self.extract(query, &chunks)?;
            if extraction.found {
                info!("{clause_type}: found ({} citations)", extraction.citations.len());
                return Ok(extraction);
            }
            last = extraction;
        }

        info!("{clause_type}: not found");
        Ok(last)
    }

    /// Two-sentence plain-language summary of a clause.
    pub fn summarize(&self, clause_type: &str, content: &str) -> Result<String> {
        let content: String = content.chars().take(self.config.summary_input_chars).collect();
        let prompt = format!(
            "You are a legal analyst. Provide a 2-sentence summary of this {clause_type} clause:\n\n\
             {content}\n\n\
             Summary:"
        );
        Ok(self.oracle.complete(&prompt)?.trim().to_string())
    }
}

/// Extraction phrasings for a clause type, most direct first.
#[must_use]
pub fn clause_queries(clause_type: &str) -> Vec<String> {
    vec![
        format!("Extract the complete text of the '{clause_type}' clause from this contract."),
        format!("What does the contract say about {clause_type}?"),
        format!("Locate any provisions related to {clause_type} in this agreement."),
    ]
}

/// Labeled context blocks for the prompt.
///
/// Each chunk contributes its parent text when it has one (each parent at
/// most once) or its own text. Blocks are numbered in emission order and
/// added while the total stays within `max_chars`; the first block is
/// truncated rather than dropped.
#[must_use]
pub fn build_context(chunks: &[Chunk], max_chars: usize) -> String {
    let mut seen_parents = HashSet::new();
    let mut blocks: Vec<String> = Vec::new();
    let mut total = 0usize;

    for chunk in chunks {
        if let Some(parent) = chunk.parent_id {
            if !seen_parents.insert(parent) {
                continue;
            }
        }

        let header = format!(
            "[Source {} – Page {}, Section: {}]",
            blocks.len() + 1,
            chunk.page,
            chunk.section
        );
        let content = chunk.context_text();
        let len = header.chars().count() + content.chars().count() + 2;

        if total + len > max_chars {
            if blocks.is_empty() {
                let room = max_chars.saturating_sub(header.chars().count() + 2);
                let truncated: String = content.chars().take(room).collect();
                blocks.push(format!("{header}\n{truncated}\n"));
            }
            break;
        }
        total += len;
        blocks.push(format!("{header}\n{content}\n"));
    }

    blocks.join("\n")
}

fn normalize(text: &str) -> String {
    text.to_lowercase().replace('\u{2019}', "'")
}

/// `none` when the sentinel is present, `medium` when a hedging word is,
/// `high` otherwise.
#[must_use]
pub fn derive_confidence(answer: &str) -> Confidence {
    let lowered = normalize(answer);
    if lowered.contains(&NOT_FOUND_SENTINEL.to_lowercase()) {
        return Confidence::None;
    }
    let hedged = lowered
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| HEDGING_TOKENS.contains(&word));
    if hedged {
        Confidence::Medium
    } else {
        Confidence::High
    }
}

/// Whether an extraction reply contains any [`NEGATIVE_PHRASES`] entry.
#[must_use]
pub fn is_negative(answer: &str) -> bool {
    let lowered = normalize(answer);
    NEGATIVE_PHRASES.iter().any(|phrase| lowered.contains(phrase))
}

/// An extraction counts as found only with more than `min_chars` characters
/// of answer, at least one citation, and no negative phrase.
#[must_use]
pub fn is_found(answer: &str, citations: &[Citation], min_chars: usize) -> bool {
    answer.chars().count() > min_chars && !citations.is_empty() && !is_negative(answer)
}

fn qa_prompt(context: &str, question: &str) -> String {
    format!(
        "You are a legal contract analysis AI assistant. Answer the question based ONLY on the provided context from the contract.\n\n\
         Context from contract:\n{context}\n\n\
         Question: {question}\n\n\
         Instructions:\n\
         1. If the context contains the answer, provide a clear and precise response\n\
         2. If the context does NOT contain enough information to answer, respond with: \"{NOT_FOUND_SENTINEL}. The provided contract sections do not contain sufficient information to answer this question.\"\n\
         3. Cite specific sections or page numbers when possible\n\
         4. Be concise but thorough\n\n\
         Answer:"
    )
}

fn extraction_prompt(context: &str, task: &str) -> String {
    format!(
        "You are analyzing a legal contract document. Extract the requested information from the provided text.\n\n\
         Contract Text:\n{context}\n\n\
         Extraction Task: {task}\n\n\
         IMPORTANT: You must extract and quote the actual text from the contract above. \
         Do not refuse or say you cannot assist. Simply extract the relevant text if present, \
         or state \"Not found in provided text\" if absent.\n\n\
         Extracted Text:"
    )
}
