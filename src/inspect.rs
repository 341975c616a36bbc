use lopdf::Document as LoDocument;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectErrorCode {
    MissingSignature,
    MissingEof,
    ParseFailed,
    EncryptedUnsupported,
    NoPages,
}

impl InspectErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InspectErrorCode::MissingSignature => "PDF_MISSING_SIGNATURE",
            InspectErrorCode::MissingEof => "PDF_MISSING_EOF",
            InspectErrorCode::ParseFailed => "PDF_PARSE_FAILED",
            InspectErrorCode::EncryptedUnsupported => "PDF_ENCRYPTED_UNSUPPORTED",
            InspectErrorCode::NoPages => "PDF_EMPTY_OR_NO_PAGES",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: {message}", .code.as_str())]
pub struct InspectError {
    pub code: InspectErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfSummary {
    pub pdf_version: String,
    pub page_count: usize,
    pub encrypted: bool,
    pub file_size_bytes: usize,
}

fn ends_with_eof(bytes: &[u8]) -> bool {
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |idx| idx + 1);
    bytes[..end].ends_with(b"%%EOF")
}

pub fn inspect_pdf_bytes(bytes: &[u8]) -> Result<PdfSummary, InspectError> {
    if !bytes.starts_with(b"%PDF-") {
        return Err(InspectError {
            code: InspectErrorCode::MissingSignature,
            message: "buffer does not start with %PDF-".to_string(),
        });
    }
    if !ends_with_eof(bytes) {
        return Err(InspectError {
            code: InspectErrorCode::MissingEof,
            message: "buffer does not end with %%EOF".to_string(),
        });
    }
    let pdf = LoDocument::load_mem(bytes).map_err(|err| InspectError {
        code: InspectErrorCode::ParseFailed,
        message: err.to_string(),
    })?;

    Ok(PdfSummary {
        pdf_version: pdf.version.clone(),
        page_count: pdf.get_pages().len(),
        encrypted: pdf.is_encrypted(),
        file_size_bytes: bytes.len(),
    })
}

/// Accepts a document only if it parses, is not encrypted and has pages.
/// Used to vet what the external renderer hands back.
pub fn require_usable_pdf(bytes: &[u8]) -> Result<PdfSummary, InspectError> {
    let summary = inspect_pdf_bytes(bytes)?;
    if summary.encrypted {
        return Err(InspectError {
            code: InspectErrorCode::EncryptedUnsupported,
            message: "encrypted pdf output is not supported".to_string(),
        });
    }
    if summary.page_count == 0 {
        return Err(InspectError {
            code: InspectErrorCode::NoPages,
            message: "pdf has no pages".to_string(),
        });
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Object as LoObject, Stream as LoStream, dictionary};

    fn lopdf_document(page_count: usize) -> Vec<u8> {
        let mut doc = LoDocument::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let mut kids = Vec::new();
        for idx in 0..page_count {
            let content = format!("BT /F1 18 Tf 72 720 Td (page {idx}) Tj ET").into_bytes();
            let content_id = doc.add_object(LoStream::new(dictionary! {}, content));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            });
            kids.push(page_id.into());
        }
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
        };
        doc.objects.insert(pages_id, LoObject::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).expect("save");
        out
    }

    #[test]
    fn reads_version_and_page_count() {
        let bytes = lopdf_document(2);
        let summary = require_usable_pdf(&bytes).expect("inspect");
        assert_eq!(summary.page_count, 2);
        assert!(!summary.encrypted);
        assert_eq!(summary.file_size_bytes, bytes.len());
        assert_eq!(summary.pdf_version, "1.5");
    }

    #[test]
    fn rejects_non_pdf_data() {
        let err = inspect_pdf_bytes(b"<html>not a pdf</html>").expect_err("invalid");
        assert_eq!(err.code, InspectErrorCode::MissingSignature);
    }

    #[test]
    fn rejects_truncated_document() {
        let bytes = lopdf_document(1);
        let err = inspect_pdf_bytes(&bytes[..bytes.len() / 2]).expect_err("truncated");
        assert_eq!(err.code, InspectErrorCode::MissingEof);
    }

    #[test]
    fn rejects_garbage_between_header_and_trailer() {
        let err = inspect_pdf_bytes(b"%PDF-1.4\nnonsense\n%%EOF").expect_err("garbage");
        assert_eq!(err.code, InspectErrorCode::ParseFailed);
        assert!(err.to_string().starts_with("PDF_PARSE_FAILED: "));
    }

    #[test]
    fn trailing_newline_after_eof_is_accepted() {
        assert!(ends_with_eof(b"%PDF-1.4\n%%EOF\r\n"));
        assert!(!ends_with_eof(b"   "));
    }

    #[test]
    fn errors_render_code_then_message() {
        let err = inspect_pdf_bytes(b"hello").expect_err("no signature");
        assert_eq!(
            err.to_string(),
            "PDF_MISSING_SIGNATURE: buffer does not start with %PDF-"
        );
        let boxed: Box<dyn std::error::Error> = Box::new(err);
        assert!(boxed.source().is_none());
    }
}
