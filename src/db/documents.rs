use super::{
    Db,
    models::{BuildInfo, StoredDocument},
    serialize_vector,
};
use crate::chunker::Chunk;
use crate::embedder::EmbedderError;
use crate::error::AuditError;
use chrono::Utc;
use rusqlite::{OptionalExtension, Result, params};

const DOCUMENT_COLUMNS: &str =
    "id, namespace, source, fingerprint, embedding_model, chunking, chunk_count, indexed_at";

fn map_document_row(row: &rusqlite::Row<'_>) -> Result<StoredDocument> {
    Ok(StoredDocument {
        id: row.get(0)?,
        namespace: row.get(1)?,
        source: row.get(2)?,
        fingerprint: row.get(3)?,
        embedding_model: row.get(4)?,
        chunking: row.get(5)?,
        chunk_count: row.get::<_, i64>(6)? as usize,
        indexed_at: row.get(7)?,
    })
}

impl Db {
    /// The document a namespace was last built from, if any.
    pub fn document(&self, namespace: &str) -> Result<Option<StoredDocument>> {
        self.conn
            .query_row(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE namespace = ?"),
                params![namespace],
                map_document_row,
            )
            .optional()
    }

    pub fn list_documents(&self) -> Result<Vec<StoredDocument>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {DOCUMENT_COLUMNS} FROM documents ORDER BY namespace"))?;
        let rows = stmt.query_map([], map_document_row)?;
        rows.collect()
    }

    /// Remove a namespace with its chunks and vectors.
    pub fn delete_namespace(&mut self, namespace: &str) -> Result<bool> {
        let tx = self.conn.transaction()?;
        // vec0 rows are not covered by the foreign key cascade
        tx.execute(
            "DELETE FROM vec_chunks WHERE rowid IN (
                SELECT c.id FROM chunks c JOIN documents d ON c.document_id = d.id
                WHERE d.namespace = ?)",
            params![namespace],
        )?;
        let rows = tx.execute("DELETE FROM documents WHERE namespace = ?", params![namespace])?;
        tx.commit()?;
        Ok(rows > 0)
    }

    /// Replace everything stored under `namespace` with `chunks`, atomically.
    ///
    /// `embeddings[i]` is the vector of `chunks[i]`.
    pub fn replace_namespace(
        &mut self,
        namespace: &str,
        build: &BuildInfo,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> crate::error::Result<StoredDocument> {
        if chunks.len() != embeddings.len() {
            return Err(AuditError::Embedding(EmbedderError::InvalidResponse(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            ))));
        }

        let tx = self.conn.transaction()?;

        tx.execute(
            "DELETE FROM vec_chunks WHERE rowid IN (
                SELECT c.id FROM chunks c JOIN documents d ON c.document_id = d.id
                WHERE d.namespace = ?)",
            params![namespace],
        )?;
        tx.execute("DELETE FROM documents WHERE namespace = ?", params![namespace])?;

        let doc_id: i64 = tx.query_row(
            r#"
            INSERT INTO documents (namespace, source, fingerprint, embedding_model, chunking,
                                   chunk_count, indexed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
            params![
                namespace,
                build.source,
                build.fingerprint,
                build.embedding_model,
                build.chunking,
                chunks.len() as i64,
                Utc::now()
            ],
            |row| row.get(0),
        )?;

        for (position, (chunk, embedding)) in chunks.iter().zip(embeddings).enumerate() {
            tx.execute(
                "INSERT INTO chunks (document_id, position, chunk_key, parent_id, child_index,
                                     page, section, start_offset, content, parent_content)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    doc_id,
                    position as i64,
                    chunk.chunk_id,
                    chunk.parent_id,
                    chunk.child_index,
                    chunk.page,
                    chunk.section,
                    chunk.start as i64,
                    chunk.text,
                    chunk.parent_text,
                ],
            )?;
            let chunk_row = tx.last_insert_rowid();

            tx.execute(
                "INSERT INTO vec_chunks (rowid, embedding) VALUES (?, ?)",
                params![chunk_row, serialize_vector(embedding)],
            )?;
        }

        let stored = tx.query_row(
            &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?"),
            params![doc_id],
            map_document_row,
        )?;
        tx.commit()?;
        Ok(stored)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn chunk(id: &str, text: &str) -> Chunk {
        Chunk {
            chunk_id: id.to_string(),
            text: text.to_string(),
            parent_id: None,
            child_index: None,
            parent_text: None,
            page: 1,
            section: "Unknown Section".to_string(),
            start: 0,
        }
    }

    pub(crate) fn build_info(source: &str, fingerprint: &str) -> BuildInfo {
        BuildInfo {
            source: source.to_string(),
            fingerprint: fingerprint.to_string(),
            embedding_model: "mock-hash".to_string(),
            chunking: "flat:100:0".to_string(),
        }
    }

    fn count(db: &Db, table: &str) -> i64 {
        db.conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_replace_namespace() {
        let mut db = Db::open_in_memory(4).unwrap();

        let chunks = vec![chunk("0", "Hello"), chunk("1", "World")];
        let embeddings = vec![vec![0.1; 4], vec![0.2; 4]];
        let doc = db
            .replace_namespace("ns", &build_info("a.pdf", "fp-a"), &chunks, &embeddings)
            .unwrap();
        assert_eq!(doc.chunk_count, 2);
        assert_eq!(doc.fingerprint, "fp-a");
        assert_eq!(doc.embedding_model, "mock-hash");
        assert_eq!(doc.chunking, "flat:100:0");
        assert_eq!(count(&db, "chunks"), 2);
        assert_eq!(count(&db, "vec_chunks"), 2);

        // Rebuild replaces, never appends
        let doc = db
            .replace_namespace(
                "ns",
                &build_info("b.pdf", "fp-b"),
                &[chunk("0", "Replaced")],
                &[vec![0.5; 4]],
            )
            .unwrap();
        assert_eq!(doc.source, "b.pdf");
        assert_eq!(count(&db, "chunks"), 1);
        assert_eq!(count(&db, "vec_chunks"), 1);

        let stored = db.document("ns").unwrap().unwrap();
        assert_eq!(stored.fingerprint, "fp-b");
        assert_eq!(stored.chunk_count, 1);
    }

    #[test]
    fn test_namespaces_are_independent() {
        let mut db = Db::open_in_memory(4).unwrap();
        db.replace_namespace("one", &build_info("a", "fa"), &[chunk("0", "A")], &[vec![0.1; 4]])
            .unwrap();
        db.replace_namespace("two", &build_info("b", "fb"), &[chunk("0", "B")], &[vec![0.1; 4]])
            .unwrap();
        let listed: Vec<String> = db
            .list_documents()
            .unwrap()
            .into_iter()
            .map(|d| d.namespace)
            .collect();
        assert_eq!(listed, ["one", "two"]);

        assert!(db.delete_namespace("one").unwrap());
        assert!(!db.delete_namespace("one").unwrap());
        assert!(db.document("one").unwrap().is_none());
        assert!(db.document("two").unwrap().is_some());
        assert_eq!(count(&db, "chunks"), 1);
        assert_eq!(count(&db, "vec_chunks"), 1);
    }

    #[test]
    fn test_replace_rejects_embedding_count_mismatch() {
        let mut db = Db::open_in_memory(4).unwrap();
        db.replace_namespace("ns", &build_info("a", "fa"), &[chunk("0", "A")], &[vec![0.1; 4]])
            .unwrap();

        let err = db
            .replace_namespace(
                "ns",
                &build_info("b", "fb"),
                &[chunk("0", "B"), chunk("1", "C")],
                &[vec![0.1; 4]],
            )
            .unwrap_err();
        assert!(matches!(err, AuditError::Embedding(_)));

        // The previous build is untouched
        assert_eq!(db.document("ns").unwrap().unwrap().fingerprint, "fa");
        assert_eq!(count(&db, "chunks"), 1);
    }

    #[test]
    fn test_missing_namespace() {
        let db = Db::open_in_memory(4).unwrap();
        assert!(db.document("nothing").unwrap().is_none());
    }
}
