//! Analysis session: configuration, oracles, and the one active index.
//!
//! The CLI drives a session for a single command; the MCP server keeps one
//! behind a mutex so a rebuild never interleaves with an analysis.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::chunker::Chunker;
use crate::config::Config;
use crate::db::Db;
use crate::document::ContractText;
use crate::embedder::Embedder;
use crate::embedder::ollama::OllamaEmbedder;
use crate::error::{AuditError, Result};
use crate::index::ContractIndex;
use crate::llm::Completer;
use crate::llm::ollama::OllamaCompleter;
use crate::models::QueryResult;
use crate::pipeline::ClausePipeline;
use crate::report::{AnalysisReport, ReportModels};
use crate::retriever::StrategyKind;

/// `db_path` value that keeps the index in memory.
pub const IN_MEMORY_DB: &str = ":memory:";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexSummary {
    pub namespace: String,
    pub source: String,
    pub fingerprint: String,
    pub chunks: usize,
}

/// One namespace stored in the index database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexInfo {
    pub namespace: String,
    pub source: String,
    pub fingerprint: String,
    pub embedding_model: String,
    pub chunking: String,
    pub chunks: usize,
    /// RFC 3339 build time.
    pub indexed_at: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyzeOptions {
    pub redline: bool,
    pub qa: bool,
    pub rebuild: bool,
}

pub struct Session {
    config: Config,
    embedder: Arc<dyn Embedder>,
    completer: Arc<dyn Completer>,
    active: Option<ContractIndex>,
}

impl Session {
    #[must_use]
    pub fn new(config: Config, embedder: Arc<dyn Embedder>, completer: Arc<dyn Completer>) -> Self {
        Self {
            config,
            embedder,
            completer,
            active: None,
        }
    }

    /// Validate `config` and connect the Ollama oracles it names.
    ///
    /// Must be called outside an async runtime.
    pub fn from_config(config: Config) -> Result<Self> {
        config
            .validate()
            .map_err(|e| AuditError::Config(format!("{e:#}")))?;

        let oracle = &config.oracle;
        let embedder = OllamaEmbedder::new(
            &oracle.base_url,
            &oracle.embedding_model,
            oracle.dimensions,
            config.oracle_timeout(),
        )
        .map_err(|e| AuditError::Config(e.to_string()))?;
        let completer = OllamaCompleter::new(&oracle.base_url, &oracle.model, config.oracle_timeout())
            .map_err(|e| AuditError::Config(e.to_string()))?;

        info!(
            "Using {} at {} (embeddings: {})",
            oracle.model, oracle.base_url, oracle.embedding_model
        );
        Ok(Self::new(config, Arc::new(embedder), Arc::new(completer)))
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Index of the document loaded last, if any.
    #[must_use]
    pub fn active(&self) -> Option<&ContractIndex> {
        self.active.as_ref()
    }

    fn open_db(&self) -> Result<Db> {
        let dims = self.embedder.dimensions();
        let db = if self.config.db_path == IN_MEMORY_DB {
            Db::open_in_memory(dims)?
        } else {
            Db::open(&self.config.db_path, dims)?
        };
        Ok(db)
    }

    /// Make `contract_path` the active document, building its index when
    /// needed (see [`ContractIndex::prepare`]).
    pub fn load(&mut self, contract_path: &Path, rebuild: bool) -> Result<&ContractIndex> {
        let contract = ContractText::load(contract_path)?;

        let reusable = !rebuild
            && self
                .active
                .as_ref()
                .is_some_and(|index| index.fingerprint() == contract.fingerprint);

        // A failed prepare leaves the previous index active
        if !reusable {
            let index = ContractIndex::prepare(
                self.open_db()?,
                self.embedder.clone(),
                &self.config.namespace,
                &contract,
                &Chunker::from_config(&self.config.chunking),
                rebuild,
            )?;
            self.active = Some(index);
        }

        self.active
            .as_ref()
            .ok_or_else(|| AuditError::IndexNotBuilt(self.config.namespace.clone()))
    }

    pub fn index_contract(&mut self, contract_path: &Path, rebuild: bool) -> Result<IndexSummary> {
        let index = self.load(contract_path, rebuild)?;
        Ok(IndexSummary {
            namespace: index.namespace().to_string(),
            source: index.source().to_string(),
            fingerprint: index.fingerprint().to_string(),
            chunks: index.len(),
        })
    }

    /// Every namespace in the index database, by name.
    pub fn list_indexes(&self) -> Result<Vec<IndexInfo>> {
        let opened;
        let db = match &self.active {
            Some(index) => index.db(),
            None => {
                opened = self.open_db()?;
                &opened
            }
        };

        let mut indexes = Vec::new();
        for doc in db.list_documents()? {
            let chunks = db.chunk_count(&doc.namespace)?;
            indexes.push(IndexInfo {
                chunks,
                indexed_at: doc.indexed_at.to_rfc3339(),
                namespace: doc.namespace,
                source: doc.source,
                fingerprint: doc.fingerprint,
                embedding_model: doc.embedding_model,
                chunking: doc.chunking,
            });
        }
        Ok(indexes)
    }

    /// Drop `namespace` from the index database. Returns whether it existed.
    pub fn delete_index(&mut self, namespace: &str) -> Result<bool> {
        let mut db = match self.active.take() {
            Some(index) if index.namespace() == namespace => index.into_db(),
            active => {
                self.active = active;
                self.open_db()?
            }
        };
        let deleted = db.delete_namespace(namespace)?;
        if deleted {
            info!("Deleted index '{namespace}'");
        }
        Ok(deleted)
    }

    /// Full clause analysis of a contract.
    pub fn analyze(&mut self, contract_path: &Path, options: AnalyzeOptions) -> Result<AnalysisReport> {
        self.load(contract_path, options.rebuild)?;
        let Some(index) = self.active.as_ref() else {
            return Err(AuditError::IndexNotBuilt(self.config.namespace.clone()));
        };

        let pipeline = ClausePipeline::new(index, self.completer.as_ref(), &self.config);
        let clauses = pipeline.analyze_all(options.redline);
        let qa = if options.qa {
            pipeline.standard_qa()
        } else {
            Vec::new()
        };

        let models = ReportModels {
            completion: self.completer.model().to_string(),
            embedding: index.document().embedding_model.clone(),
        };
        Ok(AnalysisReport::new(
            index.source(),
            index.fingerprint(),
            models,
            clauses,
            qa,
        ))
    }

    /// Answer one question about a contract, with the configured strategy
    /// unless `strategy` overrides it.
    pub fn query(
        &mut self,
        contract_path: &Path,
        question: &str,
        strategy: Option<StrategyKind>,
        rebuild: bool,
    ) -> Result<QueryResult> {
        self.load(contract_path, rebuild)?;
        let Some(index) = self.active.as_ref() else {
            return Err(AuditError::IndexNotBuilt(self.config.namespace.clone()));
        };

        let kind = strategy.unwrap_or(self.config.retrieval.strategy);
        let strategy = self.config.retrieval.strategy_for(kind);
        ClausePipeline::new(index, self.completer.as_ref(), &self.config).query_with(question, &strategy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::mock::MockEmbedder;
    use crate::llm::mock::MockCompleter;
    use std::io::Write;

    fn contract_file(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "{body}").unwrap();
        path
    }

    fn session(db_path: &Path) -> Session {
        let config = Config {
            db_path: db_path.to_string_lossy().to_string(),
            ..Config::default()
        };
        Session::new(
            config,
            Arc::new(MockEmbedder::new(32)),
            Arc::new(MockCompleter::new().with_default("The laws of Delaware apply.")),
        )
    }

    #[test]
    fn test_switching_documents_requires_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let a = contract_file(dir.path(), "a.txt", "GOVERNING LAW\nDelaware law governs.");
        let b = contract_file(dir.path(), "b.txt", "PAYMENT\nNet 30.");
        let db = dir.path().join("index.db");

        let summary = session(&db).index_contract(&a, false).unwrap();
        assert_eq!(summary.source, "a.txt");

        // A fresh session over the same file sees the stale build
        let err = session(&db).index_contract(&b, false).unwrap_err();
        assert!(matches!(err, AuditError::StaleIndex { .. }));

        let summary = session(&db).index_contract(&b, true).unwrap();
        assert_eq!(summary.source, "b.txt");
    }

    #[test]
    fn test_stale_load_keeps_active_index() {
        let dir = tempfile::tempdir().unwrap();
        let a = contract_file(dir.path(), "a.txt", "GOVERNING LAW\nDelaware law governs.");
        let b = contract_file(dir.path(), "b.txt", "PAYMENT\nNet 30.");
        let mut session = session(&dir.path().join("index.db"));

        session.index_contract(&a, false).unwrap();
        let err = session.index_contract(&b, false).unwrap_err();
        assert!(matches!(err, AuditError::StaleIndex { .. }));

        let active = session.active().unwrap();
        assert_eq!(active.source(), "a.txt");
        let result = session.query(&a, "Which law?", None, false).unwrap();
        assert_eq!(result.sources.len(), 1);
    }

    #[test]
    fn test_list_and_delete_indexes() {
        let dir = tempfile::tempdir().unwrap();
        let a = contract_file(dir.path(), "a.txt", "GOVERNING LAW\nDelaware law governs.");
        let db = dir.path().join("index.db");

        assert!(session(&db).list_indexes().unwrap().is_empty());

        let mut session = session(&db);
        session.index_contract(&a, false).unwrap();
        let indexes = session.list_indexes().unwrap();
        assert_eq!(indexes.len(), 1);
        let info = &indexes[0];
        assert_eq!(info.namespace, "contracts");
        assert_eq!(info.source, "a.txt");
        assert_eq!(info.embedding_model, "mock-hash");
        assert_eq!(info.chunking, Chunker::from_config(&session.config().chunking).signature());
        assert_eq!(info.chunks, 1);
        assert!(chrono::DateTime::parse_from_rfc3339(&info.indexed_at).is_ok());

        assert!(!session.delete_index("elsewhere").unwrap());
        assert!(session.active().is_some());

        assert!(session.delete_index("contracts").unwrap());
        assert!(session.active().is_none());
        assert!(session.list_indexes().unwrap().is_empty());
    }

    #[test]
    fn test_report_records_models() {
        let dir = tempfile::tempdir().unwrap();
        let a = contract_file(dir.path(), "a.txt", "GOVERNING LAW\nDelaware law governs.");
        let mut session = session(&dir.path().join("index.db"));

        let report = session.analyze(&a, AnalyzeOptions::default()).unwrap();
        assert_eq!(report.models.completion, "mock");
        assert_eq!(report.models.embedding, "mock-hash");
    }

    #[test]
    fn test_query_reuses_active_index() {
        let dir = tempfile::tempdir().unwrap();
        let a = contract_file(dir.path(), "a.txt", "GOVERNING LAW\nDelaware law governs.");
        let mut session = session(&dir.path().join("index.db"));

        let result = session.query(&a, "Which law?", None, false).unwrap();
        assert_eq!(result.answer, "The laws of Delaware apply.");
        let result = session
            .query(&a, "Which law?", Some(StrategyKind::Diverse), false)
            .unwrap();
        assert_eq!(result.sources.len(), 1);
    }

    #[test]
    fn test_from_config_rejects_invalid() {
        let mut config = Config::default();
        config.oracle.model = String::new();
        assert!(matches!(
            Session::from_config(config),
            Err(AuditError::Config(_))
        ));
    }

    #[test]
    fn test_missing_contract_is_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir.path().join("index.db"));
        let err = session
            .index_contract(&dir.path().join("absent.txt"), false)
            .unwrap_err();
        assert!(matches!(err, AuditError::Input(_)));
    }
}
