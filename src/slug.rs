//! The slug normalizer: every identifier that ends up in a URL or an anchor
//! goes through here. Pure functions, no I/O.

/// The maximum length of a normalized slug, in characters.
pub const MAX_LEN: usize = 80;

/// The anchor id used when a heading normalizes to nothing (empty or
/// all-punctuation headings must still be navigable).
pub const FALLBACK_ANCHOR: &str = "section";

/// Normalizes arbitrary text into a URL-safe identifier: lowercase,
/// non-alphanumerics mapped to hyphens, runs of hyphens collapsed, leading
/// and trailing hyphens stripped, truncated to [`MAX_LEN`] characters.
/// Empty or all-punctuation input yields the empty string; callers that need
/// a usable anchor should use [`heading_anchor`] instead.
///
/// Idempotent: `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(raw: &str) -> String {
    let slugged = slug::slugify(raw);
    let truncated: String = slugged.chars().take(MAX_LEN).collect();
    truncated.trim_end_matches('-').to_owned()
}

/// Normalizes heading text into an anchor id, falling back to
/// [`FALLBACK_ANCHOR`] when the text normalizes to nothing.
pub fn heading_anchor(raw: &str) -> String {
    let id = normalize(raw);
    if id.is_empty() {
        FALLBACK_ANCHOR.to_owned()
    } else {
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_basic() {
        assert_eq!(normalize("Hello, World!!"), "hello-world");
    }

    #[test]
    fn test_normalize_collapses_hyphen_runs() {
        assert_eq!(normalize("a -- b --- c"), "a-b-c");
    }

    #[test]
    fn test_normalize_all_punctuation() {
        assert_eq!(normalize("---"), "");
        assert_eq!(heading_anchor("---"), FALLBACK_ANCHOR);
    }

    #[test]
    fn test_normalize_truncates() {
        let long = "a".repeat(200);
        assert_eq!(normalize(&long).chars().count(), MAX_LEN);
    }

    #[test]
    fn test_normalize_truncation_strips_trailing_hyphen() {
        // 79 chars then a separator right at the cut point
        let raw = format!("{} tail", "b".repeat(79));
        let out = normalize(&raw);
        assert!(!out.ends_with('-'));
    }

    #[test]
    fn test_normalize_idempotent() {
        for raw in ["Hello, World!!", "  Weird -- Input??  ", "already-a-slug", ""] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn test_heading_anchor_passthrough() {
        assert_eq!(heading_anchor("Why Sleep Matters"), "why-sleep-matters");
    }
}
