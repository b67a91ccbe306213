//! Slugs, profile paths and download file names

/// Generate a document slug from its title.
///
/// Lowercases, turns every run of characters outside `[a-z0-9]` into a single
/// hyphen and trims hyphens from both ends. Non-ASCII letters are not kept, so
/// a title written entirely in them yields an empty slug.
pub fn document_slug(title: &str) -> String {
    let mut result = String::with_capacity(title.len());
    let mut prev_hyphen = false;

    for c in title.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            result.push(c);
            prev_hyphen = false;
        } else if !prev_hyphen && !result.is_empty() {
            result.push('-');
            prev_hyphen = true;
        }
    }

    result.trim_end_matches('-').to_string()
}

/// Generate a member slug: lowercase, whitespace runs become a hyphen.
///
/// Unlike document slugs, every other character is kept as-is.
pub fn member_slug(name: &str) -> String {
    collapse_whitespace(&name.to_lowercase())
}

/// Path of a member's public profile page
pub fn member_profile_path(name: &str) -> String {
    format!("/members/{}", urlencoding::encode(&member_slug(name)))
}

/// File name offered for a document download.
///
/// Keeps ASCII letters, digits, whitespace and hyphens, turns whitespace runs
/// into hyphens, lowercases and caps the stem at 50 characters.
pub fn download_filename(title: &str, extension: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace() || *c == '-')
        .collect();

    let stem = collapse_whitespace(&kept.to_ascii_lowercase());
    let stem: String = stem.chars().take(50).collect();
    format!("{}.{}", stem, extension)
}

fn collapse_whitespace(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_space = false;
    for c in value.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push('-');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}
