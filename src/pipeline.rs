//! Clause-by-clause analysis of one indexed contract.
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::extractor::Extractor;
use crate::index::ContractIndex;
use crate::llm::Completer;
use crate::models::{ClauseRecord, QueryResult, RiskRating};
use crate::retriever::{RetrievalStrategy, Retriever};
use crate::risk::RiskClassifier;
use crate::taxonomy::ClauseSpec;

/// Summary used when the oracle fails to produce one for a found clause.
pub const SUMMARY_UNAVAILABLE: &str = "Summary unavailable.";

/// Standard questions for the report's Q&A section.
pub const DEFAULT_QUESTIONS: [&str; 5] = [
    "What is the governing law for this contract?",
    "What are the termination conditions?",
    "Who owns the intellectual property?",
    "Are there any price restrictions or limitations?",
    "What are the non-compete or exclusivity requirements?",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaEntry {
    pub question: String,
    #[serde(flatten)]
    pub result: QueryResult,
}

pub struct ClausePipeline<'a> {
    index: &'a ContractIndex,
    oracle: &'a dyn Completer,
    config: &'a Config,
}

impl<'a> ClausePipeline<'a> {
    #[must_use]
    pub fn new(index: &'a ContractIndex, oracle: &'a dyn Completer, config: &'a Config) -> Self {
        Self {
            index,
            oracle,
            config,
        }
    }

    fn retriever(&self) -> Retriever<'a> {
        Retriever::new(self.index, self.oracle)
    }

    fn extractor(&self) -> Extractor<'a> {
        Extractor::new(self.oracle, &self.config.extraction)
    }

    /// One record per configured clause type, in configured order. Failures
    /// inside a clause are logged and yield its not-found record.
    ///
    /// With `include_redline`, HIGH-rated clauses also get a suggested
    /// revision.
    #[must_use]
    pub fn analyze_all(&self, include_redline: bool) -> Vec<ClauseRecord> {
        info!(
            "Analyzing {} clause types in {}",
            self.config.clauses.len(),
            self.index.source()
        );

        let mut records: Vec<ClauseRecord> = self
            .config
            .clauses
            .iter()
            .map(|spec| {
                self.analyze_clause(spec).unwrap_or_else(|e| {
                    warn!("{}: analysis failed, reporting as not found: {e}", spec.name);
                    ClauseRecord::not_found(&spec.name)
                })
            })
            .collect();

        if include_redline {
            self.attach_redlines(&mut records);
        }
        records
    }

    /// Extract, summarize and rate one clause type.
    pub fn analyze_clause(&self, spec: &ClauseSpec) -> Result<ClauseRecord> {
        let retriever = self.retriever();
        let extractor = self.extractor();
        let extraction = extractor.extract_clause(
            &spec.name,
            &retriever,
            self.config.retrieval.top_k,
            &self.config.strategy(),
        )?;

        if !extraction.found {
            return Ok(ClauseRecord::not_found(&spec.name));
        }

        let summary = extractor
            .summarize(&spec.name, &extraction.answer)
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| {
                warn!("{}: no summary from oracle", spec.name);
                SUMMARY_UNAVAILABLE.to_string()
            });

        let risk = RiskClassifier::new(self.oracle).classify(&extraction.answer, spec);

        Ok(ClauseRecord {
            clause_type: spec.name.clone(),
            found: true,
            content: Some(extraction.answer),
            summary: Some(summary),
            risk_rating: risk.rating,
            risk_explanation: risk.explanation,
            citations: extraction.citations,
            redline: None,
        })
    }

    /// Suggest revisions for every HIGH-rated record; others are untouched.
    pub fn attach_redlines(&self, records: &mut [ClauseRecord]) {
        let classifier = RiskClassifier::new(self.oracle);
        for record in records.iter_mut() {
            if record.risk_rating != RiskRating::High {
                continue;
            }
            let Some(content) = record.content.as_deref() else {
                continue;
            };
            match classifier.suggest_redline(&record.clause_type, content) {
                Ok(redline) => record.redline = Some(redline),
                Err(e) => warn!("{}: redline suggestion failed: {e}", record.clause_type),
            }
        }
    }

    /// Answer an open question with the configured strategy.
    pub fn query(&self, question: &str) -> Result<QueryResult> {
        self.query_with(question, &self.config.strategy())
    }

    pub fn query_with(&self, question: &str, strategy: &RetrievalStrategy) -> Result<QueryResult> {
        let chunks = self
            .retriever()
            .retrieve(question, self.config.retrieval.top_k, strategy)?;
        self.extractor().answer(question, &chunks)
    }

    /// Run [`DEFAULT_QUESTIONS`]. A failed question is logged and skipped.
    #[must_use]
    pub fn standard_qa(&self) -> Vec<QaEntry> {
        DEFAULT_QUESTIONS
            .iter()
            .filter_map(|question| match self.query(question) {
                Ok(result) => Some(QaEntry {
                    question: question.to_string(),
                    result,
                }),
                Err(e) => {
                    warn!("Q&A failed for {question:?}: {e}");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::{ChunkMode, Chunker};
    use crate::db::Db;
    use crate::document::ContractText;
    use crate::embedder::mock::MockEmbedder;
    use crate::llm::mock::MockCompleter;
    use std::sync::Arc;

    const NON_COMPETE: &str =
        "Vendor shall not compete with Customer worldwide, in all industries, for an indefinite period after termination.";

    fn setup() -> (ContractIndex, Config) {
        let contract = ContractText::from_pages(
            "msa.txt",
            [
                "NON-COMPETE\nVendor shall not compete with Customer worldwide, in all industries, for an indefinite period after termination.",
                "GOVERNING LAW\nThis Agreement is governed by the laws of the State of Delaware, without regard to conflicts.",
            ],
        );
        let mut config = Config::default();
        config.chunking.mode = ChunkMode::Flat;
        config.chunking.chunk_size = 200;
        config.chunking.chunk_overlap = 0;
        let index = ContractIndex::build(
            Db::open_in_memory(64).unwrap(),
            Arc::new(MockEmbedder::new(64)),
            "ns",
            &contract,
            &Chunker::from_config(&config.chunking),
        )
        .unwrap();
        (index, config)
    }

    fn oracle() -> MockCompleter {
        MockCompleter::new()
            .with_rule("Extraction Task: Extract the complete text of the 'Non-compete", NON_COMPETE)
            .with_rule("Extraction Task:", "Not found in provided text")
            .with_rule("2-sentence summary", "Vendor cannot compete. The restriction has no end date.")
            .with_rule("risk assessment expert", "RISK_LEVEL: MEDIUM\nEXPLANATION: Broad restriction.")
            .with_rule("negotiation expert", "SUGGESTED REVISION: Limit to 12 months.\nRATIONALE: Reasonable scope.")
            .with_default("The laws of Delaware.")
    }

    #[test]
    fn test_analyze_all_order_and_shapes() {
        let (index, config) = setup();
        let oracle = oracle();
        let records = ClausePipeline::new(&index, &oracle, &config).analyze_all(false);

        let names: Vec<_> = records.iter().map(|r| r.clause_type.as_str()).collect();
        let expected: Vec<_> = config.clauses.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, expected);

        for record in &records {
            if record.clause_type.starts_with("Non-compete") {
                assert!(record.found);
                // Three high-risk keywords, no low-risk ones
                assert_eq!(record.risk_rating, RiskRating::High);
                assert_eq!(record.risk_explanation, "Broad restriction.");
                assert!(!record.citations.is_empty());
                assert!(record.redline.is_none());
            } else {
                assert_eq!(*record, ClauseRecord::not_found(&record.clause_type));
            }
        }
    }

    #[test]
    fn test_redline_only_for_high() {
        let (index, config) = setup();
        let oracle = oracle();
        let records = ClausePipeline::new(&index, &oracle, &config).analyze_all(true);

        for record in &records {
            if record.risk_rating == RiskRating::High {
                let redline = record.redline.as_ref().unwrap();
                assert_eq!(redline.revision, "Limit to 12 months.");
            } else {
                assert!(record.redline.is_none());
            }
        }
        let redline_calls = oracle
            .calls()
            .iter()
            .filter(|p| p.contains("negotiation expert"))
            .count();
        assert_eq!(redline_calls, 1);
    }

    #[test]
    fn test_oracle_failure_degrades_to_not_found() {
        let (index, config) = setup();
        let oracle = MockCompleter::new().with_failure("Extraction Task:");
        let records = ClausePipeline::new(&index, &oracle, &config).analyze_all(true);
        assert_eq!(records.len(), config.clauses.len());
        assert!(records.iter().all(|r| !r.found));
    }

    #[test]
    fn test_summary_failure_keeps_record() {
        let (index, config) = setup();
        let oracle = MockCompleter::new()
            .with_rule("Extraction Task: Extract the complete text of the 'Non-compete", NON_COMPETE)
            .with_rule("Extraction Task:", "")
            .with_failure("2-sentence summary")
            .with_default("RISK_LEVEL: LOW\nEXPLANATION: Fine.");
        let records = ClausePipeline::new(&index, &oracle, &config).analyze_all(false);
        let record = records.iter().find(|r| r.found).unwrap();
        assert_eq!(record.summary.as_deref(), Some(SUMMARY_UNAVAILABLE));
        assert_eq!(record.risk_rating, RiskRating::Low);
    }

    #[test]
    fn test_query_and_standard_qa() {
        let (index, config) = setup();
        let oracle = oracle();
        let pipeline = ClausePipeline::new(&index, &oracle, &config);

        let result = pipeline.query("What law governs?").unwrap();
        assert_eq!(result.answer, "The laws of Delaware.");
        assert!(!result.sources.is_empty());

        let qa = pipeline.standard_qa();
        assert_eq!(qa.len(), DEFAULT_QUESTIONS.len());
        assert_eq!(qa[0].question, DEFAULT_QUESTIONS[0]);
    }
}
