//! Document ingestion: PDF loading, embedding, and Qdrant writes.

mod loader;
pub mod pdf;
mod pipeline;
#[cfg(test)]
mod test_pdf;
pub mod types;

pub use loader::load_texts_from_folder;
pub use pipeline::IngestionPipeline;
pub use types::{IngestError, IngestReport, SourceDocument};
