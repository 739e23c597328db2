/// Slug-safe object name derived from an original filename. ASCII
/// alphanumerics are kept lowercased, runs of anything else collapse
/// to a single dash, and the extension survives as a suffix.
pub fn slugify_file_name(original: &str) -> String {
    let trimmed = original.trim();
    let (stem, extension) = match trimmed.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, Some(ext)),
        _ => (trimmed, None),
    };

    let slug = slugify(stem);
    let slug = if slug.is_empty() {
        "file".to_string()
    } else {
        slug
    };

    match extension.map(slugify).filter(|ext| !ext.is_empty()) {
        Some(ext) => format!("{slug}.{ext}"),
        None => slug,
    }
}

fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_dash = false;
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}
