//! Derives the human-readable invoice number from a downloaded XML document.

use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;
use tracing::{debug, error};

/// Keeps alphanumerics plus `-`, `_` and `#`, then trims trailing whitespace.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '#'))
        .collect::<String>()
        .trim_end()
        .to_string()
}

/// Reads `xml_path` and returns the sanitized invoice number, if any.
///
/// Read and parse errors are logged and yield `None`; the caller falls back to
/// the invoice id.
pub fn parse_invoice_number_from_xml(xml_path: &Path) -> Option<String> {
    let bytes = match std::fs::read(xml_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(path = %xml_path.display(), error = %e, "[XML][ERROR] Cannot read XML");
            return None;
        }
    };
    match extract_invoice_number(&bytes) {
        Ok(number) => {
            debug!(path = %xml_path.display(), number = ?number, "[XML] Extracted invoice number");
            number
        }
        Err(e) => {
            error!(path = %xml_path.display(), error = %e, "[XML][ERROR] Failed to parse XML");
            None
        }
    }
}

/// Why a document could not yield an invoice number.
#[derive(Debug, Error)]
pub enum InvoiceXmlError {
    #[error(transparent)]
    Parse(#[from] quick_xml::Error),
    #[error("document ends with <{0}> still open")]
    Unclosed(String),
    #[error("document has no root element")]
    NoRoot,
}

/// Scans the whole document; the first `ID` element with text wins, then the
/// first `PaymentID`. Namespace prefixes are ignored.
///
/// Text is not trimmed before that choice, so a whitespace-only `ID` still
/// wins and sanitizes to `None`.
pub fn extract_invoice_number(xml: &[u8]) -> Result<Option<String>, InvoiceXmlError> {
    let mut reader = Reader::from_reader(xml);

    let mut buf = Vec::new();
    // Local names of every open element, outermost first.
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut seen_root = false;
    // Local name of the innermost open element, until its first child or text.
    let mut open: Option<Vec<u8>> = None;
    let mut id: Option<String> = None;
    let mut payment_id: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = e.local_name().as_ref().to_vec();
                seen_root = true;
                stack.push(name.clone());
                open = Some(name);
            }
            Event::Empty(_) => {
                seen_root = true;
                open = None;
            }
            Event::End(_) => {
                stack.pop();
                open = None;
            }
            Event::Text(t) => {
                if let Some(tag) = open.take() {
                    let text = t.unescape()?;
                    keep_first(&tag, &text, &mut id, &mut payment_id);
                }
            }
            Event::CData(c) => {
                if let Some(tag) = open.take() {
                    let text = String::from_utf8_lossy(&c);
                    keep_first(&tag, &text, &mut id, &mut payment_id);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(name) = stack.pop() {
        return Err(InvoiceXmlError::Unclosed(
            String::from_utf8_lossy(&name).into_owned(),
        ));
    }
    if !seen_root {
        return Err(InvoiceXmlError::NoRoot);
    }

    Ok(id
        .or(payment_id)
        .map(|raw| sanitize_filename(&raw))
        .filter(|number| !number.is_empty()))
}

fn keep_first(tag: &[u8], text: &str, id: &mut Option<String>, payment_id: &mut Option<String>) {
    if text.is_empty() {
        return;
    }
    let slot = match tag {
        b"ID" => id,
        b"PaymentID" => payment_id,
        _ => return,
    };
    if slot.is_none() {
        *slot = Some(text.to_string());
    }
}
