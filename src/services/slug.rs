//! URL slug generation for blogs, tags and projects

/// Lowercase, replace runs of separators and ASCII punctuation with a single
/// hyphen, and trim hyphens from both ends. Non-ASCII letters are kept.
pub fn generate_slug(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_hyphen = false;

    for c in input.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() || (!c.is_ascii() && c.is_alphanumeric()) {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

/// A slug that is not taken, appending `-2`, `-3`, … to `base` as needed
pub async fn unique_slug<F, Fut>(base: &str, mut taken: F) -> anyhow::Result<String>
where
    F: FnMut(String) -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<bool>>,
{
    if !taken(base.to_string()).await? {
        return Ok(base.to_string());
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}-{}", base, n);
        if !taken(candidate.clone()).await? {
            return Ok(candidate);
        }
        n += 1;
    }
}
