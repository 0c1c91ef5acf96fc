//! Retrieval-augmented answering over stored IT documents.

mod prompt;
mod service;
pub mod types;

pub use service::{QueryApi, RagService};
pub use types::{HealthSnapshot, RagError};
