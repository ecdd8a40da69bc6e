//! PDF payload validation.
//!
//! The legacy portals routinely return HTML error pages with a 200 status,
//! so every downloaded payload is checked against the PDF magic header
//! before it is allowed anywhere near the downstream pipeline.

/// PDF files begin with `%PDF-`.
const PDF_MAGIC: &[u8; 5] = b"%PDF-";

/// Check whether a payload is a PDF by magic header.
pub fn is_pdf(content: &[u8]) -> bool {
    content.len() >= PDF_MAGIC.len() && &content[..PDF_MAGIC.len()] == PDF_MAGIC
}

/// Detect the content type of a downloaded payload.
///
/// Prefers magic-byte detection over whatever the server claimed, since
/// the portals are not reliable about Content-Type headers.
pub fn detect_content_type(content: &[u8]) -> &'static str {
    if is_pdf(content) {
        return "application/pdf";
    }
    match infer::get(content) {
        Some(kind) => kind.mime_type(),
        None => "application/octet-stream",
    }
}
