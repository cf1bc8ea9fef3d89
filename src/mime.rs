use std::path::Path;

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Content type for a file, by extension.
pub fn content_type(path: &Path) -> String {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    // pinned, since `mime_guess` has changed its answer for js between releases
    match ext.as_deref() {
        Some("html" | "htm") => "text/html".to_string(),
        Some("css") => "text/css".to_string(),
        Some("js" | "mjs") => "application/javascript".to_string(),
        _ => mime_guess::from_path(path)
            .first_raw()
            .unwrap_or(OCTET_STREAM)
            .to_string(),
    }
}
