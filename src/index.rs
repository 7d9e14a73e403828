//! Per-contract vector index handle.
//!
//! A `ContractIndex` owns its database connection and is bound to one
//! namespace and one document fingerprint. Opening a namespace that was built
//! from another document, with another embedding model, or with other
//! chunking settings fails instead of silently mixing chunks.

use std::sync::Arc;

use tracing::{debug, info};

use crate::chunker::{Chunk, Chunker};
use crate::db::Db;
use crate::db::models::{BuildInfo, StoredDocument};
use crate::document::ContractText;
use crate::embedder::{Embedder, EmbedderError};
use crate::error::{AuditError, Result};

/// Texts sent to the embedding oracle per request.
const EMBED_BATCH_SIZE: usize = 32;

pub struct ContractIndex {
    db: Db,
    embedder: Arc<dyn Embedder>,
    document: StoredDocument,
}

impl std::fmt::Debug for ContractIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractIndex")
            .field("document", &self.document)
            .finish_non_exhaustive()
    }
}

impl ContractIndex {
    /// Chunk and embed `contract`, replacing whatever `namespace` held before.
    pub fn build(
        mut db: Db,
        embedder: Arc<dyn Embedder>,
        namespace: &str,
        contract: &ContractText,
        chunker: &Chunker,
    ) -> Result<Self> {
        check_dimensions(&db, embedder.as_ref())?;
        let chunks = chunker.chunk(contract);
        info!(
            "Building index '{namespace}' for {} ({} chunks, {})",
            contract.source,
            chunks.len(),
            embedder.model()
        );

        let embeddings = embed_chunks(embedder.as_ref(), &chunks)?;
        let build = BuildInfo {
            source: contract.source.clone(),
            fingerprint: contract.fingerprint.clone(),
            embedding_model: embedder.model().to_string(),
            chunking: chunker.signature(),
        };
        let document = db.replace_namespace(namespace, &build, &chunks, &embeddings)?;

        info!("Index '{namespace}' ready");
        Ok(Self {
            db,
            embedder,
            document,
        })
    }

    /// Open an existing build of `namespace`, which must have been built from
    /// the document with `fingerprint` by the same embedding model and
    /// chunker.
    pub fn open(
        db: Db,
        embedder: Arc<dyn Embedder>,
        namespace: &str,
        fingerprint: &str,
        chunker: &Chunker,
    ) -> Result<Self> {
        check_dimensions(&db, embedder.as_ref())?;

        let document = db
            .document(namespace)?
            .ok_or_else(|| AuditError::IndexNotBuilt(namespace.to_string()))?;

        if document.fingerprint != fingerprint {
            return Err(AuditError::StaleIndex {
                namespace: namespace.to_string(),
                expected: fingerprint.to_string(),
                found: document.fingerprint,
            });
        }
        check_setting(
            namespace,
            "embedding model",
            embedder.model(),
            &document.embedding_model,
        )?;
        check_setting(namespace, "chunking", &chunker.signature(), &document.chunking)?;

        debug!(
            "Opened index '{namespace}' ({} chunks, built {})",
            document.chunk_count, document.indexed_at
        );
        Ok(Self {
            db,
            embedder,
            document,
        })
    }

    /// Open `namespace` for `contract`, building it when it does not exist or
    /// when `rebuild` is set. A namespace built from another document, or
    /// with another embedding model or chunker, is rejected unless `rebuild`
    /// is set.
    pub fn prepare(
        db: Db,
        embedder: Arc<dyn Embedder>,
        namespace: &str,
        contract: &ContractText,
        chunker: &Chunker,
        rebuild: bool,
    ) -> Result<Self> {
        let exists = db.document(namespace)?.is_some();
        if rebuild || !exists {
            return Self::build(db, embedder, namespace, contract, chunker);
        }
        Self::open(db, embedder, namespace, &contract.fingerprint, chunker)
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.document.namespace
    }

    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.document.fingerprint
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.document.source
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.document.chunk_count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.document.chunk_count == 0
    }

    #[must_use]
    pub fn document(&self) -> &StoredDocument {
        &self.document
    }

    pub(crate) fn db(&self) -> &Db {
        &self.db
    }

    /// Give the connection back, e.g. to rebuild for another document.
    #[must_use]
    pub fn into_db(self) -> Db {
        self.db
    }

    /// Top `k` chunks by cosine similarity, most similar first.
    pub fn query_similar(&self, text: &str, k: usize) -> Result<Vec<(Chunk, f32)>> {
        let k = k.min(self.len());
        if k == 0 {
            return Ok(Vec::new());
        }
        let query = self.embedder.embed(text)?;
        let hits = self.db.search(self.namespace(), &query, k)?;
        Ok(hits.into_iter().map(|h| (h.chunk, h.similarity)).collect())
    }

    /// Maximal-marginal-relevance selection of `k` chunks from the `fetch_k`
    /// most similar candidates. `fetch_k` is clamped to the index size.
    ///
    /// `lambda = 1` is pure relevance, `lambda = 0` pure diversity.
    pub fn query_diverse(
        &self,
        text: &str,
        k: usize,
        fetch_k: usize,
        lambda: f32,
    ) -> Result<Vec<Chunk>> {
        let fetch_k = fetch_k.max(k).min(self.len());
        if fetch_k == 0 || k == 0 {
            return Ok(Vec::new());
        }

        let query = self.embedder.embed(text)?;
        let candidates = self
            .db
            .search_with_embeddings(self.namespace(), &query, fetch_k)?;
        let vectors: Vec<&[f32]> = candidates.iter().map(|(_, v)| v.as_slice()).collect();

        let picked = mmr_select(&query, &vectors, k, lambda);
        debug!(
            "MMR picked {} of {} candidates (lambda {lambda})",
            picked.len(),
            candidates.len()
        );

        let mut candidates: Vec<Option<Chunk>> =
            candidates.into_iter().map(|(hit, _)| Some(hit.chunk)).collect();
        Ok(picked
            .into_iter()
            .filter_map(|i| candidates[i].take())
            .collect())
    }
}

fn check_dimensions(db: &Db, embedder: &dyn Embedder) -> Result<()> {
    match db.stored_dimensions()? {
        Some(stored) if stored != embedder.dimensions() => Err(AuditError::Config(format!(
            "index database stores {stored}-dimensional vectors but the embedder produces {}",
            embedder.dimensions()
        ))),
        _ => Ok(()),
    }
}

fn check_setting(namespace: &str, setting: &'static str, expected: &str, found: &str) -> Result<()> {
    if expected == found {
        return Ok(());
    }
    Err(AuditError::IndexMismatch {
        namespace: namespace.to_string(),
        setting,
        expected: expected.to_string(),
        found: found.to_string(),
    })
}

fn embed_chunks(embedder: &dyn Embedder, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
    let mut embeddings = Vec::with_capacity(chunks.len());
    for batch in chunks.chunks(EMBED_BATCH_SIZE) {
        let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
        let vectors = embedder.embed_batch(&texts)?;
        if vectors.len() != texts.len() {
            return Err(EmbedderError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            ))
            .into());
        }
        embeddings.extend(vectors);
    }
    Ok(embeddings)
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na * nb)
}

/// Indices into `candidates` in selection order. Ties go to the earlier
/// candidate, so the result is a pure function of the inputs.
fn mmr_select(query: &[f32], candidates: &[&[f32]], k: usize, lambda: f32) -> Vec<usize> {
    let relevance: Vec<f32> = candidates.iter().map(|c| cosine(query, c)).collect();
    let mut selected: Vec<usize> = Vec::with_capacity(k.min(candidates.len()));

    while selected.len() < k.min(candidates.len()) {
        let mut best: Option<(usize, f32)> = None;
        for (i, candidate) in candidates.iter().enumerate() {
            if selected.contains(&i) {
                continue;
            }
            let redundancy = selected
                .iter()
                .map(|&j| cosine(candidate, candidates[j]))
                .fold(f32::NEG_INFINITY, f32::max);
            let redundancy = if selected.is_empty() { 0.0 } else { redundancy };
            let score = lambda * relevance[i] - (1.0 - lambda) * redundancy;

            if best.is_none_or(|(_, s)| score > s) {
                best = Some((i, score));
            }
        }
        match best {
            Some((i, _)) => selected.push(i),
            None => break,
        }
    }
    selected
}
