//! Content type detection for uploads
//!
//! Types are sniffed from the leading bytes of the content with `infer`.
//! Text formats have no magic signature, so anything that is not
//! recognised but decodes as UTF-8 is reported as plain text. That is wrong
//! for the text formats a browser cares about, so a fixed table of
//! extension overrides wins over the sniffed type: a stylesheet served as
//! `text/plain` is ignored by browsers.

use std::path::Path;

/// Type reported for unrecognised text
pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
/// Type reported for unrecognised binary content
pub const OCTET_STREAM: &str = "application/octet-stream";

/// How many leading bytes are inspected for the text check
const SNIFF_LEN: usize = 8192;

/// Extensions whose type cannot be sniffed reliably
const EXTENSION_OVERRIDES: &[(&str, &str)] = &[
    ("css", "text/css"),
    ("js", "text/javascript"),
    ("mjs", "text/javascript"),
    ("json", "application/json"),
    ("map", "application/json"),
    ("svg", "image/svg+xml"),
    ("html", "text/html; charset=utf-8"),
    ("htm", "text/html; charset=utf-8"),
    ("txt", TEXT_PLAIN),
    ("md", "text/markdown; charset=utf-8"),
    ("xml", "application/xml"),
    ("wasm", "application/wasm"),
];

/// Override for the extension of `key`, if it has one
pub fn override_for(key: &str) -> Option<&'static str> {
    let ext = Path::new(key).extension()?.to_str()?.to_ascii_lowercase();
    EXTENSION_OVERRIDES
        .iter()
        .find(|(candidate, _)| *candidate == ext)
        .map(|(_, content_type)| *content_type)
}

/// Sniff the content type of `content` from its signature
pub fn sniff(content: &[u8]) -> &'static str {
    if let Some(kind) = infer::get(content) {
        return kind.mime_type();
    }
    if looks_like_text(content) {
        TEXT_PLAIN
    } else {
        OCTET_STREAM
    }
}

/// Content type to submit for `content` stored under `key`
pub fn detect(key: &str, content: &[u8]) -> &'static str {
    override_for(key).unwrap_or_else(|| sniff(content))
}

fn looks_like_text(content: &[u8]) -> bool {
    let prefix = &content[..content.len().min(SNIFF_LEN)];
    if prefix.contains(&0) {
        return false;
    }
    match std::str::from_utf8(prefix) {
        Ok(_) => true,
        // A multi-byte character cut off by the prefix boundary is fine
        Err(e) => e.error_len().is_none(),
    }
}
