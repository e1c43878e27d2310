use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use arrow_array::{RecordBatch, RecordBatchIterator};
use futures::TryStreamExt;
use lancedb::DistanceType;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::table::Table;
use tokio::fs;
use tracing::{debug, info};

use super::schema::{self, TABLE_COURSES, VECTOR_COLUMN};
use super::{Embedder, StoreError};
use crate::courses::Metadata;

#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    pub embedding: Vec<f32>,
}

/// One similarity search result. Smaller distance means more similar.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryHit {
    pub id: String,
    pub document: String,
    pub metadata: Metadata,
    pub distance: f32,
}

/// Course documents in a LanceDB `courses` table under `dir`.
///
/// The table is created on the first upsert, sized to the embedder's output.
pub struct VectorStore<E> {
    dir: PathBuf,
    conn: Connection,
    table: Option<Table>,
    embedder: E,
}

impl<E: std::fmt::Debug> std::fmt::Debug for VectorStore<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("dir", &self.dir)
            .field("has_table", &self.table.is_some())
            .field("embedder", &self.embedder)
            .finish_non_exhaustive()
    }
}

fn id_filter(id: &str) -> String {
    format!("id = '{}'", id.replace('\'', "''"))
}

impl<E: Embedder> VectorStore<E> {
    /// Opens (or creates) the database in `dir`.
    pub async fn open(dir: impl AsRef<Path>, embedder: E) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;

        let conn = lancedb::connect(&dir.to_string_lossy()).execute().await?;
        let table = if conn
            .table_names()
            .execute()
            .await?
            .iter()
            .any(|name| name == TABLE_COURSES)
        {
            Some(conn.open_table(TABLE_COURSES).execute().await?)
        } else {
            None
        };

        debug!(dir = %dir.display(), has_table = table.is_some(), "opened course index");
        Ok(Self {
            dir,
            conn,
            table,
            embedder,
        })
    }

    pub async fn len(&self) -> Result<usize, StoreError> {
        match &self.table {
            Some(table) => Ok(table.count_rows(None).await?),
            None => Ok(0),
        }
    }

    pub async fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len().await? == 0)
    }

    pub async fn get(&self, id: &str) -> Result<Option<StoredDocument>, StoreError> {
        let Some(table) = &self.table else {
            return Ok(None);
        };
        let batches: Vec<RecordBatch> = table
            .query()
            .only_if(id_filter(id))
            .limit(1)
            .execute()
            .await?
            .try_collect()
            .await?;

        for batch in &batches {
            if let Some(doc) = schema::read_documents(batch)?.into_iter().next() {
                return Ok(Some(doc));
            }
        }
        Ok(None)
    }

    /// Embeds the documents and merges them into the table by id: existing
    /// rows are replaced, new ids inserted. Within one call the last
    /// document for an id wins.
    pub async fn upsert(
        &mut self,
        documents: Vec<String>,
        metadatas: Vec<Metadata>,
        ids: Vec<String>,
    ) -> Result<usize, StoreError> {
        if documents.len() != metadatas.len() || documents.len() != ids.len() {
            return Err(StoreError::LengthMismatch {
                documents: documents.len(),
                metadatas: metadatas.len(),
                ids: ids.len(),
            });
        }
        if documents.is_empty() {
            return Ok(0);
        }

        let embeddings = self.embedder.embed_documents(&documents).await?;
        if embeddings.len() != documents.len() {
            return Err(StoreError::EmbeddingCount {
                expected: documents.len(),
                got: embeddings.len(),
            });
        }
        let dim = embeddings[0].len();
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dim) {
            return Err(StoreError::Dimension {
                expected: dim,
                got: bad.len(),
            });
        }

        let count = documents.len();
        let mut rows = BTreeMap::new();
        for (((text, metadata), id), embedding) in documents
            .into_iter()
            .zip(metadatas)
            .zip(ids)
            .zip(embeddings)
        {
            rows.insert(
                id.clone(),
                StoredDocument {
                    id,
                    text,
                    metadata,
                    embedding,
                },
            );
        }
        let rows: Vec<StoredDocument> = rows.into_values().collect();

        let table = self.table_for(dim).await?;
        let batch = schema::to_batch(&rows, dim)?;
        let batch_schema = batch.schema();
        let reader = RecordBatchIterator::new(vec![Ok(batch)], batch_schema);

        let mut merge = table.merge_insert(&["id"]);
        merge.when_matched_update_all(None).when_not_matched_insert_all();
        merge.execute(Box::new(reader)).await?;

        info!(
            upserted = count,
            total = table.count_rows(None).await?,
            "course index updated"
        );
        Ok(count)
    }

    /// The `k` documents closest to `text` by cosine distance, nearest first.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<QueryHit>, StoreError> {
        let Some(table) = &self.table else {
            return Ok(Vec::new());
        };
        if k == 0 {
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed_query(text).await?;
        let batches: Vec<RecordBatch> = table
            .vector_search(vector)?
            .column(VECTOR_COLUMN)
            .distance_type(DistanceType::Cosine)
            .limit(k)
            .execute()
            .await?
            .try_collect()
            .await?;

        let mut hits = Vec::new();
        for batch in &batches {
            hits.extend(schema::read_hits(batch)?);
        }
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(hits)
    }

    /// The courses table, created with a `dim`-wide vector column if missing.
    async fn table_for(&mut self, dim: usize) -> Result<Table, StoreError> {
        if let Some(table) = &self.table {
            let table_schema = table.schema().await?;
            let expected = schema::vector_dim(&table_schema)?;
            if expected != dim {
                return Err(StoreError::Dimension { expected, got: dim });
            }
            return Ok(table.clone());
        }

        let table = self
            .conn
            .create_empty_table(TABLE_COURSES, schema::course_schema(dim))
            .execute()
            .await?;
        info!(dir = %self.dir.display(), dim, "created course table");
        self.table = Some(table.clone());
        Ok(table)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic embedder: counts a few keywords so related texts land
    /// near each other.
    #[derive(Debug, Default)]
    pub struct KeywordEmbedder {
        pub document_calls: AtomicUsize,
    }

    const KEYWORDS: [&str; 4] = ["database", "learning", "algorithm", "systems"];

    pub fn keyword_vector(text: &str) -> Vec<f32> {
        let text = text.to_lowercase();
        let mut v: Vec<f32> = KEYWORDS
            .iter()
            .map(|k| text.matches(*k).count() as f32)
            .collect();
        v.push(0.1);
        v
    }

    impl Embedder for KeywordEmbedder {
        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StoreError> {
            self.document_calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| keyword_vector(t)).collect())
        }

        async fn embed_query(&self, text: &str) -> Result<Vec<f32>, StoreError> {
            Ok(keyword_vector(text))
        }
    }
}
