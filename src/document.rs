//! Routing of response bodies by what they actually contain.
//!
//! Only HTML goes through the DOM sanitizer. Plain text is kept as text,
//! PDFs are run through `pdf-extract`, and anything else (images, archives,
//! octet streams) is reported as unreadable instead of being decoded into
//! junk.

use url::Url;

use crate::classifier::PageFailure;
use crate::renderer::RenderedPage;

/// Leading bytes inspected for NUL when the content type says nothing useful.
const SNIFF_LEN: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Html,
    Text,
    Pdf,
    Binary,
}

impl BodyKind {
    /// Magic bytes win over the declared type for PDFs and images; servers
    /// routinely mislabel both.
    pub fn detect(content_type: Option<&str>, body: &[u8]) -> BodyKind {
        let mime = mime_type(content_type);
        if mime == "application/pdf" || bytes_look_like_pdf(body) {
            return BodyKind::Pdf;
        }
        if bytes_look_like_image(body) {
            return BodyKind::Binary;
        }
        if mime == "text/html" || mime == "application/xhtml+xml" || bytes_look_like_html(body) {
            return BodyKind::Html;
        }
        if has_nul(body) {
            return BodyKind::Binary;
        }
        if mime.is_empty() {
            return BodyKind::Html;
        }
        let is_json = mime == "application/json" || mime.ends_with("+json");
        let is_xml = mime == "application/xml" || mime.ends_with("+xml");
        if mime.starts_with("text/") || is_json || is_xml {
            BodyKind::Text
        } else {
            BodyKind::Binary
        }
    }
}

/// Lowercased media type without parameters, empty when absent.
pub fn mime_type(content_type: Option<&str>) -> String {
    content_type
        .unwrap_or("")
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

pub fn bytes_look_like_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF-")
}

pub fn bytes_look_like_html(bytes: &[u8]) -> bool {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let rest = &bytes[start..];
    let prefix: Vec<u8> = rest.iter().take(9).map(u8::to_ascii_lowercase).collect();
    let tags: [&[u8]; 4] = [b"<!doctype", b"<html", b"<head", b"<body"];
    tags.iter().any(|tag| prefix.starts_with(tag))
}

pub fn bytes_look_like_image(bytes: &[u8]) -> bool {
    bytes.starts_with(b"\x89PNG\r\n\x1a\n")
        || bytes.starts_with(b"\xff\xd8\xff")
        || bytes.starts_with(b"GIF87a")
        || bytes.starts_with(b"GIF89a")
        || (bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP")
}

fn has_nul(bytes: &[u8]) -> bool {
    bytes.iter().take(SNIFF_LEN).any(|b| *b == 0)
}

/// True when the URL path names a `.pdf` file. Looks at the string only.
pub fn is_pdf_url(url: &str) -> bool {
    Url::parse(url)
        .map(|u| u.path().to_ascii_lowercase().ends_with(".pdf"))
        .unwrap_or(false)
}

/// Title derived from the PDF's file name, e.g. `annual_report-2024.pdf`
/// becomes `annual report 2024`.
pub fn pdf_title_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let file = parsed.path_segments()?.last()?;
    let stem = match file.len().checked_sub(4) {
        Some(cut) if file.is_char_boundary(cut) && file[cut..].eq_ignore_ascii_case(".pdf") => {
            &file[..cut]
        }
        _ => file,
    };
    let title = stem
        .replace("%20", " ")
        .replace(['_', '-'], " ")
        .trim()
        .to_string();
    if title.is_empty() { None } else { Some(title) }
}

/// Text layer of a PDF page body. A body cut short by the byte cap cannot be
/// parsed, so it is rejected up front.
pub async fn pdf_to_text(page: &RenderedPage) -> Result<String, PageFailure> {
    if page.truncated {
        return Err(PageFailure::Unreadable(format!(
            "pdf larger than {} bytes",
            page.body.len()
        )));
    }
    let body = page.body.clone();
    // pdf parsing is CPU bound and may panic on hostile input.
    tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&body))
        .await
        .map_err(|e| PageFailure::Unreadable(format!("pdf parser crashed: {e}")))?
        .map_err(|e| PageFailure::Unreadable(format!("pdf parse error: {e}")))
}

/// Failure for a body nobody here can read.
pub fn unsupported(page: &RenderedPage) -> PageFailure {
    let mime = mime_type(page.content_type.as_deref());
    let mime = if mime.is_empty() { "unknown" } else { mime.as_str() };
    PageFailure::Unreadable(format!("unsupported content type {mime}"))
}
