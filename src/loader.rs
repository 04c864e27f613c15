//! Document loading for the two supported upload formats (PDF, DOCX).
//!
//! Takes a filesystem path and returns the document's plain UTF-8 text.
//! Format support is deliberately narrow: adding a format means adding a
//! loader here, not touching the chunker or the knowledge store.

use std::io::Read;
use std::path::Path;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Loading error (never panics; the upload boundary maps these to a
/// structured error payload).
#[derive(Debug)]
pub enum LoadError {
    /// The path does not resolve to a readable file.
    PathNotFound(String),
    /// The file extension is not one of the supported formats.
    UnsupportedFormat(String),
    /// The file was readable but yielded no extractable text
    /// (encrypted, corrupt, or empty).
    MalformedDocument(String),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::PathNotFound(p) => write!(f, "path not found: {}", p),
            LoadError::UnsupportedFormat(ext) => {
                write!(f, "unsupported format: {} (only .pdf and .docx)", ext)
            }
            LoadError::MalformedDocument(e) => write!(f, "malformed document: {}", e),
        }
    }
}

impl std::error::Error for LoadError {}

/// Load a document from disk and extract its plain text.
pub fn load_document(path: &Path) -> Result<String, LoadError> {
    if !path.is_file() {
        return Err(LoadError::PathNotFound(path.display().to_string()));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let bytes = std::fs::read(path)
        .map_err(|e| LoadError::MalformedDocument(format!("read failed: {}", e)))?;

    let text = match ext.as_str() {
        "pdf" => extract_pdf(&bytes)?,
        "docx" => extract_docx(&bytes)?,
        other => return Err(LoadError::UnsupportedFormat(other.to_string())),
    };

    if text.trim().is_empty() {
        return Err(LoadError::MalformedDocument(
            "no extractable text content".to_string(),
        ));
    }

    Ok(text)
}

fn extract_pdf(bytes: &[u8]) -> Result<String, LoadError> {
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| LoadError::MalformedDocument(e.to_string()))
}

fn extract_docx(bytes: &[u8]) -> Result<String, LoadError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| LoadError::MalformedDocument(e.to_string()))?;
    let mut doc_xml = Vec::new();
    {
        let entry = archive
            .by_name("word/document.xml")
            .map_err(|_| LoadError::MalformedDocument("word/document.xml not found".to_string()))?;
        entry
            .take(MAX_XML_ENTRY_BYTES)
            .read_to_end(&mut doc_xml)
            .map_err(|e| LoadError::MalformedDocument(e.to_string()))?;
        if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
            return Err(LoadError::MalformedDocument(
                "word/document.xml exceeds size limit".to_string(),
            ));
        }
    }
    extract_w_t_elements(&doc_xml)
}

/// Walk `<w:t>` text runs in WordprocessingML. Paragraph ends (`</w:p>`)
/// become newlines so the chunker sees document structure.
fn extract_w_t_elements(xml: &[u8]) -> Result<String, LoadError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        out.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"p" && !out.ends_with('\n') && !out.is_empty() {
                    out.push('\n');
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(LoadError::MalformedDocument(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_returns_path_not_found() {
        let err = load_document(Path::new("/no/such/file.pdf")).unwrap_err();
        assert!(matches!(err, LoadError::PathNotFound(_)));
    }

    #[test]
    fn unknown_extension_returns_unsupported() {
        let tmp = tempfile::NamedTempFile::with_suffix(".txt").unwrap();
        std::fs::write(tmp.path(), "plain text").unwrap();
        let err = load_document(tmp.path()).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedFormat(_)));
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        let tmp = tempfile::NamedTempFile::with_suffix(".PDF").unwrap();
        std::fs::write(tmp.path(), "not a pdf").unwrap();
        // Dispatches to the PDF loader, which then rejects the garbage bytes.
        let err = load_document(tmp.path()).unwrap_err();
        assert!(matches!(err, LoadError::MalformedDocument(_)));
    }

    #[test]
    fn invalid_zip_returns_malformed_for_docx() {
        let tmp = tempfile::NamedTempFile::with_suffix(".docx").unwrap();
        std::fs::write(tmp.path(), "not a zip").unwrap();
        let err = load_document(tmp.path()).unwrap_err();
        assert!(matches!(err, LoadError::MalformedDocument(_)));
    }

    #[test]
    fn docx_text_runs_are_extracted() {
        let xml = br#"<?xml version="1.0"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>Hello</w:t></w:r></w:p><w:p><w:r><w:t>World</w:t></w:r></w:p></w:body></w:document>"#;
        let text = extract_w_t_elements(xml).unwrap();
        assert!(text.contains("Hello"));
        assert!(text.contains("World"));
    }
}
