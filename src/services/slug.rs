//! Slug helpers shared by articles, categories, tags and heading anchors

/// Maximum slug length accepted from clients
pub const MAX_SLUG_LENGTH: usize = 200;

/// Generate a URL-friendly slug.
///
/// Lowercases, keeps alphanumeric characters (including non-ASCII letters)
/// and collapses every other run of characters into a single hyphen.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for c in text.chars() {
        let mut lowered = c
            .to_lowercase()
            .filter(|l| l.is_alphanumeric() && !l.is_uppercase())
            .peekable();
        if lowered.peek().is_none() {
            pending_hyphen = true;
            continue;
        }
        if pending_hyphen && !slug.is_empty() {
            slug.push('-');
        }
        pending_hyphen = false;
        slug.extend(lowered);
    }

    slug
}

/// Check that a client-supplied slug is URL-safe: lowercase alphanumerics
/// separated by single hyphens.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.chars().count() <= MAX_SLUG_LENGTH
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
        && slug
            .chars()
            .all(|c| c == '-' || (c.is_alphanumeric() && !c.is_uppercase()))
}
