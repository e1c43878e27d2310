//! Arrow layout of the `courses` table and record batch conversions.

use std::sync::Arc;

use arrow_array::{Array, ArrayRef, FixedSizeListArray, Float32Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema, SchemaRef};

use super::StoreError;
use super::vector::{QueryHit, StoredDocument};
use crate::courses::Metadata;

pub const TABLE_COURSES: &str = "courses";
pub const VECTOR_COLUMN: &str = "vector";
/// Added by LanceDB to vector search results.
const DISTANCE_COLUMN: &str = "_distance";

fn item_field() -> Arc<Field> {
    Arc::new(Field::new("item", DataType::Float32, true))
}

pub fn course_schema(dim: usize) -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("document", DataType::Utf8, false),
        Field::new("metadata", DataType::Utf8, false),
        Field::new(
            VECTOR_COLUMN,
            DataType::FixedSizeList(item_field(), dim as i32),
            false,
        ),
    ]))
}

/// Embedding width of an existing table.
pub fn vector_dim(schema: &Schema) -> Result<usize, StoreError> {
    match schema.field_with_name(VECTOR_COLUMN)?.data_type() {
        DataType::FixedSizeList(_, dim) => Ok(*dim as usize),
        other => Err(StoreError::Schema(format!(
            "`{VECTOR_COLUMN}` column has type {other}"
        ))),
    }
}

pub fn to_batch(docs: &[StoredDocument], dim: usize) -> Result<RecordBatch, StoreError> {
    let ids = StringArray::from_iter_values(docs.iter().map(|d| d.id.as_str()));
    let texts = StringArray::from_iter_values(docs.iter().map(|d| d.text.as_str()));
    let metadata: Vec<String> = docs
        .iter()
        .map(|d| serde_json::to_string(&d.metadata))
        .collect::<Result<_, _>>()?;
    let values =
        Float32Array::from_iter_values(docs.iter().flat_map(|d| d.embedding.iter().copied()));
    let vectors = FixedSizeListArray::try_new(item_field(), dim as i32, Arc::new(values), None)?;

    Ok(RecordBatch::try_new(
        course_schema(dim),
        vec![
            Arc::new(ids) as ArrayRef,
            Arc::new(texts),
            Arc::new(StringArray::from(metadata)),
            Arc::new(vectors),
        ],
    )?)
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T, StoreError> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| StoreError::Schema(format!("missing or mistyped column `{name}`")))
}

fn metadata_at(column: &StringArray, row: usize) -> Result<Metadata, StoreError> {
    Ok(serde_json::from_str(column.value(row))?)
}

pub fn read_documents(batch: &RecordBatch) -> Result<Vec<StoredDocument>, StoreError> {
    let ids = column::<StringArray>(batch, "id")?;
    let texts = column::<StringArray>(batch, "document")?;
    let metadata = column::<StringArray>(batch, "metadata")?;
    let vectors = column::<FixedSizeListArray>(batch, VECTOR_COLUMN)?;

    (0..batch.num_rows())
        .map(|row| {
            let values = vectors.value(row);
            let embedding = values
                .as_any()
                .downcast_ref::<Float32Array>()
                .map(|v| v.values().to_vec())
                .ok_or_else(|| StoreError::Schema("vector items are not f32".into()))?;
            Ok(StoredDocument {
                id: ids.value(row).to_string(),
                text: texts.value(row).to_string(),
                metadata: metadata_at(metadata, row)?,
                embedding,
            })
        })
        .collect()
}

pub fn read_hits(batch: &RecordBatch) -> Result<Vec<QueryHit>, StoreError> {
    let ids = column::<StringArray>(batch, "id")?;
    let texts = column::<StringArray>(batch, "document")?;
    let metadata = column::<StringArray>(batch, "metadata")?;
    let distances = column::<Float32Array>(batch, DISTANCE_COLUMN)?;

    (0..batch.num_rows())
        .map(|row| {
            Ok(QueryHit {
                id: ids.value(row).to_string(),
                document: texts.value(row).to_string(),
                metadata: metadata_at(metadata, row)?,
                distance: distances.value(row),
            })
        })
        .collect()
}
