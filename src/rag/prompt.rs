use crate::completion::ChatMessage;
use crate::qdrant::ScoredPoint;

const SYSTEM_TEMPLATE: &str = "Use the following pieces of context to answer the user's question. \n\
If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\
----------------\n";

const DOCUMENT_SEPARATOR: &str = "\n\n";

/// Join the stored text of every hit, skipping hits without text.
pub(crate) fn format_context(hits: &[ScoredPoint]) -> String {
    hits.iter()
        .filter_map(ScoredPoint::page_content)
        .collect::<Vec<_>>()
        .join(DOCUMENT_SEPARATOR)
}

/// System message carrying the retrieved context, followed by the user's query.
pub(crate) fn build_messages(query: &str, hits: &[ScoredPoint]) -> Vec<ChatMessage> {
    let system = format!("{SYSTEM_TEMPLATE}{}", format_context(hits));
    vec![ChatMessage::system(system), ChatMessage::user(query)]
}
