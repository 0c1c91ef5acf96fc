//! Helpers for constructing Qdrant payloads.
//!
//! Payloads use the `page_content` / `metadata` layout so that
//! collections populated by other ingesters stay readable.

use serde_json::{Value, json};
use time::OffsetDateTime;
use uuid::Uuid;

/// Build the payload object stored alongside each document vector.
pub(crate) fn build_payload(text: &str, source: &str, ingested_at: &str) -> Value {
    json!({
        "page_content": text,
        "metadata": {
            "source": source,
            "ingested_at": ingested_at,
        }
    })
}

/// Current timestamp formatted for payload storage.
pub fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Fresh point identifier; every upsert creates new points.
pub(crate) fn generate_point_id() -> String {
    Uuid::new_v4().to_string()
}
