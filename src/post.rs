//! Defines the [`Record`] and [`GeneratedPost`] types. A [`GeneratedPost`] is
//! what the upstream content generator hands us; a [`Record`] is the slice of
//! it that survives into the post index. Also defines tag normalization and
//! related-post selection, both of which operate on index order
//! (most-recent-first).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::slug;

/// The fixed set of tag values a post may carry. Anything else normalizes to
/// the [`DEFAULT_TAG`] fallback at publish time.
pub const ALLOWED_TAGS: &[&str] = &[
    "sleep",
    "stress",
    "recipes",
    "home-workouts",
    "gut",
    "weight",
    "anti-inflammatory",
    "longevity",
    "mental-wellness",
    "healthy-habits",
    "health",
];

/// The tag used when a generated post carries no usable tag.
pub const DEFAULT_TAG: &str = "health";

/// How many related posts are selected for a post page.
pub const RELATED_COUNT: usize = 3;

/// Metadata for one published article, as persisted in the post index. The
/// index is a JSON array of these, newest first, with at most one record per
/// slug.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub slug: String,
    pub title: String,
    pub description: String,

    /// ISO calendar date of the run that published this record.
    pub date: String,

    /// Relative path of the rendered page, always `{slug}.html`.
    pub url: String,

    /// Relative path of the hero image asset.
    pub hero: String,

    #[serde(default = "default_tag")]
    pub tag: String,
}

fn default_tag() -> String {
    DEFAULT_TAG.to_owned()
}

/// A generated article as delivered by the (external) content generator.
/// Every string field is required to be non-empty; [`GeneratedPost::validate`]
/// enforces that before anything is written to disk.
#[derive(Clone, Debug, Deserialize)]
pub struct GeneratedPost {
    pub slug: String,
    pub title: String,
    pub meta_description: String,
    pub html: String,
    pub image_query: String,
    pub pin_title: String,
    pub pin_description: String,
    pub alt_text: String,

    #[serde(default)]
    pub tag: String,
}

impl GeneratedPost {
    /// Checks that every required field is present and non-blank. Returns the
    /// first offending field. Publishing an invalid post must not write any
    /// artifact, so this runs before all I/O.
    pub fn validate(&self) -> Result<(), InvalidPost> {
        let fields = [
            ("slug", &self.slug),
            ("title", &self.title),
            ("meta_description", &self.meta_description),
            ("html", &self.html),
            ("image_query", &self.image_query),
            ("pin_title", &self.pin_title),
            ("pin_description", &self.pin_description),
            ("alt_text", &self.alt_text),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(InvalidPost { field: name });
            }
        }
        if slug::normalize(&self.slug).is_empty() {
            return Err(InvalidPost { field: "slug" });
        }
        Ok(())
    }

    /// The post's tag, normalized against [`ALLOWED_TAGS`] with the
    /// [`DEFAULT_TAG`] fallback.
    pub fn normalized_tag(&self) -> String {
        normalize_tag(&self.tag).unwrap_or_else(|| DEFAULT_TAG.to_owned())
    }
}

/// Lowercases and hyphenates a raw tag value, returning it only if it is one
/// of the [`ALLOWED_TAGS`].
pub fn normalize_tag(raw: &str) -> Option<String> {
    let tag = raw.trim().to_lowercase().replace(['_', ' '], "-");
    if ALLOWED_TAGS.contains(&tag.as_str()) {
        Some(tag)
    } else {
        None
    }
}

/// Selects up to [`RELATED_COUNT`] other records for a post: same-tag records
/// first (in index order, i.e. most-recent-first), padded with other records
/// when fewer than [`RELATED_COUNT`] share the tag. The current post is
/// excluded by slug.
pub fn related<'a>(records: &'a [Record], tag: &str, current_slug: &str) -> Vec<&'a Record> {
    let mut picked: Vec<&Record> = records
        .iter()
        .filter(|r| r.slug != current_slug && r.tag == tag)
        .take(RELATED_COUNT)
        .collect();
    if picked.len() < RELATED_COUNT {
        for record in records {
            if picked.len() >= RELATED_COUNT {
                break;
            }
            if record.slug != current_slug && record.tag != tag {
                picked.push(record);
            }
        }
    }
    picked
}

/// Returned when a generated post is missing a required field. The publish
/// flow surfaces this to the caller without writing anything.
#[derive(Debug, PartialEq, Eq)]
pub struct InvalidPost {
    pub field: &'static str,
}

impl fmt::Display for InvalidPost {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "missing or empty article field: {}", self.field)
    }
}

impl std::error::Error for InvalidPost {}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(slug: &str, tag: &str) -> Record {
        Record {
            slug: slug.to_owned(),
            title: format!("Title for {}", slug),
            description: "desc".to_owned(),
            date: "2026-01-01".to_owned(),
            url: format!("{}.html", slug),
            hero: format!("assets/{}.jpg", slug),
            tag: tag.to_owned(),
        }
    }

    fn generated() -> GeneratedPost {
        GeneratedPost {
            slug: "better-sleep".to_owned(),
            title: "Better Sleep".to_owned(),
            meta_description: "How to sleep better.".to_owned(),
            html: "<p>Body.</p>".to_owned(),
            image_query: "sleep bedroom".to_owned(),
            pin_title: "Pin".to_owned(),
            pin_description: "Pin desc".to_owned(),
            alt_text: "A dark bedroom".to_owned(),
            tag: "sleep".to_owned(),
        }
    }

    #[test]
    fn test_validate_accepts_complete_post() {
        assert_eq!(generated().validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_blank_field() {
        let mut post = generated();
        post.title = "   ".to_owned();
        assert_eq!(post.validate(), Err(InvalidPost { field: "title" }));
    }

    #[test]
    fn test_validate_rejects_unusable_slug() {
        let mut post = generated();
        post.slug = "!!!".to_owned();
        assert_eq!(post.validate(), Err(InvalidPost { field: "slug" }));
    }

    #[test]
    fn test_normalize_tag() {
        assert_eq!(normalize_tag("Sleep"), Some("sleep".to_owned()));
        assert_eq!(normalize_tag("home_workouts"), Some("home-workouts".to_owned()));
        assert_eq!(normalize_tag("mental wellness"), Some("mental-wellness".to_owned()));
        assert_eq!(normalize_tag("astrology"), None);
        assert_eq!(normalize_tag(""), None);
    }

    #[test]
    fn test_related_prefers_same_tag_in_index_order() {
        let records = vec![
            record("s1", "sleep"),
            record("g1", "gut"),
            record("s2", "sleep"),
            record("s3", "sleep"),
            record("s4", "sleep"),
            record("g2", "gut"),
            record("s5", "sleep"),
        ];
        let picks = related(&records, "sleep", "current");
        let slugs: Vec<&str> = picks.iter().map(|r| r.slug.as_str()).collect();
        assert_eq!(slugs, vec!["s1", "s2", "s3"]);
    }

    #[test]
    fn test_related_pads_with_other_tags() {
        let records = vec![
            record("s1", "sleep"),
            record("g1", "gut"),
            record("w1", "weight"),
        ];
        let picks = related(&records, "sleep", "current");
        let slugs: Vec<&str> = picks.iter().map(|r| r.slug.as_str()).collect();
        assert_eq!(slugs, vec!["s1", "g1", "w1"]);
    }

    #[test]
    fn test_related_excludes_self() {
        let records = vec![record("s1", "sleep"), record("s2", "sleep")];
        let picks = related(&records, "sleep", "s1");
        let slugs: Vec<&str> = picks.iter().map(|r| r.slug.as_str()).collect();
        assert_eq!(slugs, vec!["s2"]);
    }

    #[test]
    fn test_related_empty_index() {
        let picks = related(&[], "sleep", "current");
        assert!(picks.is_empty());
    }
}
