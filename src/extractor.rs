//! PDF text extraction.

use std::collections::BTreeMap;

use lopdf::{Document, Encoding, Object, ObjectId};

use crate::error::{AppError, Result};

/// Extract the text of every page, in page order.
///
/// Text operators are followed in content-stream order; line moves (`Td`,
/// `TD`, `T*`, `'`, `"`) and the end of a text object become line breaks.
/// Pages whose content cannot be decoded are skipped.
pub fn extract_text(pdf: &[u8]) -> Result<String> {
    let document = Document::load_mem(pdf).map_err(|e| AppError::DocumentParse(e.to_string()))?;
    if document.is_encrypted() {
        return Err(AppError::DocumentParse(
            "encrypted PDFs are not supported".to_string(),
        ));
    }

    let pages = document.get_pages();
    let mut text = String::new();
    for (page_number, page_id) in &pages {
        match page_text(&document, *page_id) {
            Ok(page) => {
                text.push_str(&page);
                end_line(&mut text);
            }
            Err(e) => {
                tracing::warn!(page = *page_number, error = %e, "skipping page without extractable text")
            }
        }
    }
    tracing::debug!(pages = pages.len(), chars = text.chars().count(), "extracted PDF text");
    Ok(text)
}

fn page_text(document: &Document, page_id: ObjectId) -> lopdf::Result<String> {
    let encodings: BTreeMap<Vec<u8>, Encoding> = document
        .get_page_fonts(page_id)?
        .into_iter()
        .map(|(name, font)| font.get_font_encoding(document).map(|enc| (name, enc)))
        .collect::<lopdf::Result<_>>()?;
    let content = document.get_and_decode_page_content(page_id)?;

    let mut text = String::new();
    let mut encoding: Option<&Encoding> = None;
    for operation in &content.operations {
        match operation.operator.as_str() {
            "Tf" => {
                let font = operation
                    .operands
                    .first()
                    .ok_or(lopdf::Error::DictKey)?
                    .as_name()?;
                encoding = encodings.get(font);
            }
            "Tj" | "TJ" => {
                if let Some(encoding) = encoding {
                    collect_text(&mut text, encoding, &operation.operands)?;
                }
            }
            // `'` and `"` move to the next line, then show their last operand.
            "'" | "\"" => {
                end_line(&mut text);
                if let (Some(encoding), Some(shown)) = (encoding, operation.operands.last()) {
                    collect_text(&mut text, encoding, std::slice::from_ref(shown))?;
                }
            }
            "Td" | "TD" | "T*" | "ET" => end_line(&mut text),
            _ => {}
        }
    }
    Ok(text)
}

fn collect_text(text: &mut String, encoding: &Encoding, operands: &[Object]) -> lopdf::Result<()> {
    for operand in operands {
        match operand {
            Object::String(bytes, _) => text.push_str(&Document::decode_text(encoding, bytes)?),
            Object::Array(items) => collect_text(text, encoding, items)?,
            // Large negative kerning in a `TJ` array is a word gap.
            Object::Integer(i) if *i < -100 => text.push(' '),
            Object::Real(r) if *r < -100.0 => text.push(' '),
            _ => {}
        }
    }
    Ok(())
}

fn end_line(text: &mut String) {
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_are_a_parse_error() {
        let err = extract_text(b"definitely not a pdf").unwrap_err();
        assert!(matches!(err, AppError::DocumentParse(_)));
    }

    #[test]
    fn kerning_gaps_become_spaces() {
        let mut text = String::new();
        let operands = vec![Object::Array(vec![
            Object::string_literal("Hello"),
            Object::Integer(-250),
            Object::string_literal("world"),
            Object::Integer(-20),
            Object::string_literal("!"),
        ])];
        let latin1: [Option<u16>; 256] = std::array::from_fn(|byte| Some(byte as u16));
        collect_text(&mut text, &Encoding::OneByteEncoding(&latin1), &operands).unwrap();
        assert_eq!(text, "Hello world!");
    }

    #[test]
    fn line_breaks_are_not_doubled() {
        let mut text = String::new();
        end_line(&mut text);
        assert!(text.is_empty());
        text.push_str("line");
        end_line(&mut text);
        end_line(&mut text);
        assert_eq!(text, "line\n");
    }
}
