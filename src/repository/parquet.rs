//! Parquet encoding for snapshot tables
//!
//! Converts commits and pull requests to Arrow RecordBatches and back.
//! Timestamps are stored as RFC 3339 strings so files stay readable by
//! pandas/DuckDB without timezone surprises.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Int64Array, RecordBatch, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use bytes::Bytes;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::error::StoreError;
use crate::model::{Commit, PullRequest};
use crate::util::format_rfc3339;

// =============================================================================
// Schemas
// =============================================================================

/// Arrow schema for `commits.parquet`
pub fn commit_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("sha", DataType::Utf8, false),
        Field::new("message", DataType::Utf8, false),
        Field::new("author", DataType::Utf8, false),
        Field::new("date", DataType::Utf8, false),
        Field::new("url", DataType::Utf8, false),
    ]))
}

/// Arrow schema for `pull_requests.parquet`
pub fn pull_request_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("number", DataType::Int64, false),
        Field::new("title", DataType::Utf8, false),
        Field::new("author", DataType::Utf8, false),
        Field::new("state", DataType::Utf8, false),
        Field::new("created_at", DataType::Utf8, false),
        Field::new("url", DataType::Utf8, false),
    ]))
}

// =============================================================================
// Record batches
// =============================================================================

pub fn commits_to_record_batch(commits: &[Commit]) -> Result<RecordBatch, arrow::error::ArrowError> {
    let dates: Vec<String> = commits.iter().map(|c| format_rfc3339(c.date())).collect();

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(commits.iter().map(Commit::sha))),
        Arc::new(StringArray::from_iter_values(commits.iter().map(Commit::message))),
        Arc::new(StringArray::from_iter_values(commits.iter().map(Commit::author))),
        Arc::new(StringArray::from_iter_values(dates)),
        Arc::new(StringArray::from_iter_values(commits.iter().map(Commit::url))),
    ];

    RecordBatch::try_new(commit_schema(), columns)
}

pub fn pull_requests_to_record_batch(
    prs: &[PullRequest],
) -> Result<RecordBatch, arrow::error::ArrowError> {
    let created: Vec<String> = prs.iter().map(|p| format_rfc3339(p.created_at())).collect();

    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from_iter_values(prs.iter().map(PullRequest::number))),
        Arc::new(StringArray::from_iter_values(prs.iter().map(PullRequest::title))),
        Arc::new(StringArray::from_iter_values(prs.iter().map(PullRequest::author))),
        Arc::new(StringArray::from_iter_values(prs.iter().map(PullRequest::state))),
        Arc::new(StringArray::from_iter_values(created)),
        Arc::new(StringArray::from_iter_values(prs.iter().map(PullRequest::url))),
    ];

    RecordBatch::try_new(pull_request_schema(), columns)
}

// =============================================================================
// Encode
// =============================================================================

fn write_batch(batch: &RecordBatch) -> Result<Bytes, StoreError> {
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buf, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(Bytes::from(buf))
}

/// Encode commits as a Parquet file
pub fn encode_commits(commits: &[Commit]) -> Result<Bytes, StoreError> {
    write_batch(&commits_to_record_batch(commits)?)
}

/// Encode pull requests as a Parquet file
pub fn encode_pull_requests(prs: &[PullRequest]) -> Result<Bytes, StoreError> {
    write_batch(&pull_requests_to_record_batch(prs)?)
}

// =============================================================================
// Decode
// =============================================================================

fn read_batches(data: Bytes) -> Result<Vec<RecordBatch>, StoreError> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(data)?.build()?;
    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch?);
    }
    Ok(batches)
}

fn corrupt(location: &str, reason: impl Into<String>) -> StoreError {
    StoreError::Corrupt {
        location: location.to_string(),
        reason: reason.into(),
    }
}

fn string_column<'a>(
    batch: &'a RecordBatch,
    name: &str,
    location: &str,
) -> Result<&'a StringArray, StoreError> {
    batch
        .column_by_name(name)
        .and_then(|col| col.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| corrupt(location, format!("missing or non-string column `{name}`")))
}

fn int_column<'a>(
    batch: &'a RecordBatch,
    name: &str,
    location: &str,
) -> Result<&'a Int64Array, StoreError> {
    batch
        .column_by_name(name)
        .and_then(|col| col.as_any().downcast_ref::<Int64Array>())
        .ok_or_else(|| corrupt(location, format!("missing or non-int64 column `{name}`")))
}

fn value(col: &StringArray, row: usize) -> &str {
    if col.is_null(row) { "" } else { col.value(row) }
}

/// Decode a `commits.parquet` file; `location` is only used in error messages
pub fn decode_commits(data: Bytes, location: &str) -> Result<Vec<Commit>, StoreError> {
    let mut commits = Vec::new();
    for batch in read_batches(data)? {
        let sha = string_column(&batch, "sha", location)?;
        let message = string_column(&batch, "message", location)?;
        let author = string_column(&batch, "author", location)?;
        let date = string_column(&batch, "date", location)?;
        let url = string_column(&batch, "url", location)?;

        for row in 0..batch.num_rows() {
            let commit = Commit::new(
                value(sha, row),
                value(message, row),
                value(author, row),
                value(date, row),
                value(url, row),
            )
            .map_err(|e| corrupt(location, format!("row {row}: {e}")))?;
            commits.push(commit);
        }
    }
    Ok(commits)
}

/// Decode a `pull_requests.parquet` file
pub fn decode_pull_requests(data: Bytes, location: &str) -> Result<Vec<PullRequest>, StoreError> {
    let mut prs = Vec::new();
    for batch in read_batches(data)? {
        let number = int_column(&batch, "number", location)?;
        let title = string_column(&batch, "title", location)?;
        let author = string_column(&batch, "author", location)?;
        let state = string_column(&batch, "state", location)?;
        let created_at = string_column(&batch, "created_at", location)?;
        let url = string_column(&batch, "url", location)?;

        for row in 0..batch.num_rows() {
            let n = if number.is_null(row) { 0 } else { number.value(row) };
            let pr = PullRequest::new(
                n,
                value(title, row),
                value(author, row),
                value(state, row),
                value(created_at, row),
                value(url, row),
            )
            .map_err(|e| corrupt(location, format!("row {row}: {e}")))?;
            prs.push(pr);
        }
    }
    Ok(prs)
}

// =============================================================================
// Tests
// =============================================================================
