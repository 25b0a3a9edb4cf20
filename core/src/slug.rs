use std::collections::HashSet;

/// Upper bound on insert attempts when a freshly chosen slug loses a race.
pub const MAX_SLUG_ATTEMPTS: usize = 5;

/// Derives a URL-safe slug: lowercase, only `[a-z0-9-]`, whitespace and hyphen
/// runs collapsed to a single hyphen, no leading or trailing hyphen.
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    let mut slug = String::with_capacity(lowered.len());
    let mut pending_separator = false;

    for ch in lowered.trim().chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(ch);
        } else if ch == '-' || ch.is_whitespace() {
            pending_separator = true;
        }
    }

    slug
}

/// `slugify(name)`, or `fallback` when the name has no usable characters.
pub fn slug_base(name: &str, fallback: &str) -> String {
    let slug = slugify(name);
    if slug.is_empty() {
        fallback.to_owned()
    } else {
        slug
    }
}

/// Picks `base`, or the first `base-N` (N >= 1) not present in `taken`.
///
/// `taken` is expected to come from a single prefix scan of the scope.
pub fn next_available_slug(base: &str, taken: &[String]) -> String {
    let taken: HashSet<&str> = taken.iter().map(String::as_str).collect();
    if !taken.contains(base) {
        return base.to_owned();
    }

    let mut counter = 1_u64;
    loop {
        let candidate = format!("{base}-{counter}");
        if !taken.contains(candidate.as_str()) {
            return candidate;
        }
        counter += 1;
    }
}
