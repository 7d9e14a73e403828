use super::{Db, deserialize_vector, models::SearchHit, serialize_vector};
use crate::chunker::Chunk;
use rusqlite::{Result, params};

const HIT_COLUMNS: &str = r#"
    c.chunk_key,
    c.content,
    c.parent_id,
    c.child_index,
    c.parent_content,
    c.page,
    c.section,
    c.start_offset,
    vec_distance_cosine(v.embedding, ?1) as distance,
    v.embedding
"#;

fn map_hit_row(row: &rusqlite::Row<'_>) -> Result<(SearchHit, Vec<f32>)> {
    let distance: f64 = row.get(8)?;
    let similarity = (1.0 - distance / 2.0) as f32;
    let embedding: Vec<u8> = row.get(9)?;

    let chunk = Chunk {
        chunk_id: row.get(0)?,
        text: row.get(1)?,
        parent_id: row.get(2)?,
        child_index: row.get(3)?,
        parent_text: row.get(4)?,
        page: row.get(5)?,
        section: row.get(6)?,
        start: row.get::<_, i64>(7)? as usize,
    };

    Ok((SearchHit { chunk, similarity }, deserialize_vector(&embedding)))
}

impl Db {
    /// Nearest chunks of `namespace` by cosine distance, closest first.
    /// Ties keep insertion order.
    pub fn search(&self, namespace: &str, query_vector: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
        Ok(self
            .search_with_embeddings(namespace, query_vector, limit)?
            .into_iter()
            .map(|(hit, _)| hit)
            .collect())
    }

    /// Like [`Db::search`], also returning each chunk's stored vector.
    pub fn search_with_embeddings(
        &self,
        namespace: &str,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<(SearchHit, Vec<f32>)>> {
        let query = format!(
            r#"
            SELECT {HIT_COLUMNS}
            FROM vec_chunks v
            JOIN chunks c ON v.rowid = c.id
            JOIN documents d ON c.document_id = d.id
            WHERE d.namespace = ?2
            ORDER BY distance ASC, c.position ASC
            LIMIT ?3
            "#
        );

        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt.query_map(
            params![serialize_vector(query_vector), namespace, limit as i64],
            map_hit_row,
        )?;
        rows.collect()
    }

    /// Number of chunks stored under `namespace`.
    pub fn chunk_count(&self, namespace: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM chunks c JOIN documents d ON c.document_id = d.id
             WHERE d.namespace = ?",
            params![namespace],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
