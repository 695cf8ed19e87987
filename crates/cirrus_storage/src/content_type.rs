//! Content type inference for uploads.

/// Longest content type that will be stored.
pub const MAX_CONTENT_TYPE_LEN: usize = 255;

/// Content type to store for an upload.
///
/// A supplied, non-blank type wins. Otherwise the type is inferred from the
/// filename's extension. An unknown extension or a type longer than
/// [`MAX_CONTENT_TYPE_LEN`] yields an empty string rather than an error.
///
/// # Examples
///
/// ```
/// use cirrus_storage::resolve_content_type;
///
/// assert_eq!(resolve_content_type(None, "diagram.png"), "image/png");
/// assert_eq!(resolve_content_type(Some("text/csv"), "export.bin"), "text/csv");
/// assert_eq!(resolve_content_type(None, "notes.unknownext"), "");
/// ```
pub fn resolve_content_type(supplied: Option<&str>, filename: &str) -> String {
    let content_type = supplied
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| {
            mime_guess::from_path(filename)
                .first_raw()
                .map(str::to_string)
        })
        .unwrap_or_default();

    if content_type.len() > MAX_CONTENT_TYPE_LEN {
        tracing::debug!(
            filename,
            length = content_type.len(),
            "Dropping oversized content type"
        );
        return String::new();
    }
    content_type
}

/// Whether a thumbnail can be rendered for this content type.
pub fn is_thumbnailable(content_type: &str) -> bool {
    content_type.starts_with("image/") || content_type == "application/pdf"
}
