//! PDF text extraction.

use lopdf::Document;

/// Extract the text of every page, in page order, without inserting separators.
pub fn extract_text(bytes: &[u8]) -> Result<String, lopdf::Error> {
    let document = Document::load_mem(bytes)?;
    let mut text = String::new();
    for page_number in document.get_pages().keys() {
        text.push_str(&document.extract_text(&[*page_number])?);
    }
    Ok(text)
}
