//! Text transforms that turn raw generated article markup into publish-ready
//! markup: heading anchors + table of contents, internal-link placeholder
//! resolution, the related-reading section, and the quick-answer / FAQ
//! extraction that feeds structured data.
//!
//! These are deliberately narrow, line-tolerant transforms over the markup
//! shapes the content generator is contracted to produce (`<h2>`/`<h3>`
//! sections, `<p>` paragraphs, quoted `href` attributes) — not a general
//! HTML parser. Unexpected markup degrades to an empty TOC or FAQ list
//! rather than an error.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::post::Record;
use crate::render::escape_html;
use crate::slug;

/// How many entries the visible table of contents shows. Every level-2
/// heading still receives an anchor id, cap or no cap.
pub const TOC_LIMIT: usize = 6;

/// How many FAQ entries are extracted for structured data.
pub const FAQ_LIMIT: usize = 8;

/// Character cap for the extracted quick answer.
pub const QUICK_ANSWER_MAX: usize = 260;

/// How many `#recent-N` placeholder slots are resolved.
pub const PLACEHOLDER_SLOTS: usize = 5;

/// Where placeholders point when there is no related post to take the slot.
pub const HOME_TARGET: &str = "index.html";

const QUICK_ANSWER_FALLBACK: &str =
    "A practical overview with clear steps you can apply today.";

static H2: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<h2([^>]*)>(.*?)</h2>").unwrap());
static H2_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<h2[^>]*>").unwrap());
static H3: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<h3([^>]*)>(.*?)</h3>").unwrap());
static PARAGRAPH: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<p[^>]*>(.*?)</p>").unwrap());
static ID_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)id\s*=\s*["']([^"']+)["']"#).unwrap());
static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

/// One table-of-contents entry: the heading's stripped text and its anchor
/// id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TocEntry {
    pub text: String,
    pub id: String,
}

/// One extracted FAQ entry, used for the FAQPage structured-data block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FaqItem {
    pub question: String,
    pub answer: String,
}

/// Gives every level-2 heading an anchor id and collects the table of
/// contents (capped at [`TOC_LIMIT`] entries). Headings that already carry
/// an `id` attribute are left untouched; their TOC entry uses the slug of
/// that id. Injected ids are deduplicated with a `-2`, `-3`, … suffix so
/// repeated headings stay navigable.
pub fn assign_heading_anchors(html: &str) -> (String, Vec<TocEntry>) {
    let mut entries = Vec::new();
    let mut used: HashSet<String> = HashSet::new();

    let out = H2.replace_all(html, |caps: &Captures| {
        let attrs = caps.get(1).map_or("", |m| m.as_str());
        let inner = caps.get(2).map_or("", |m| m.as_str());
        let text = strip_tags(inner);

        if let Some(existing) = ID_ATTR.captures(attrs) {
            let id = slug::heading_anchor(&existing[1]);
            used.insert(id.clone());
            entries.push(TocEntry { text, id });
            return caps[0].to_string();
        }

        let mut id = slug::heading_anchor(&text);
        if used.contains(&id) {
            let mut n = 2;
            while used.contains(&format!("{}-{}", id, n)) {
                n += 1;
            }
            id = format!("{}-{}", id, n);
        }
        used.insert(id.clone());
        entries.push(TocEntry {
            text,
            id: id.clone(),
        });
        format!("<h2{} id=\"{}\">{}</h2>", attrs, id, inner)
    });

    entries.truncate(TOC_LIMIT);
    (out.into_owned(), entries)
}

/// Rewrites the fixed `#recent-1` … `#recent-5` placeholder targets to the
/// URLs of the related posts, in both quote forms. Slots past the end of the
/// related list fall back to the home page target.
pub fn resolve_internal_placeholders(html: &str, related: &[&Record]) -> String {
    let mut out = html.to_owned();
    for slot in 0..PLACEHOLDER_SLOTS {
        let target = related
            .get(slot)
            .map(|r| r.url.as_str())
            .unwrap_or(HOME_TARGET);
        let placeholder = format!("#recent-{}", slot + 1);
        out = out.replace(
            &format!("href=\"{}\"", placeholder),
            &format!("href=\"{}\"", target),
        );
        out = out.replace(
            &format!("href='{}'", placeholder),
            &format!("href='{}'", target),
        );
    }
    out
}

/// Appends the related-reading section. With no related posts the markup is
/// returned unchanged.
pub fn append_related_section(html: &str, related: &[&Record]) -> String {
    if related.is_empty() {
        return html.to_owned();
    }
    let items: String = related
        .iter()
        .map(|r| {
            format!(
                "<li><a href='{url}'>{title}</a> \
                 <a class='tag-pill' href='tag/{tag}.html'>{tag}</a></li>",
                url = escape_html(&r.url),
                title = escape_html(&r.title),
                tag = escape_html(&r.tag),
            )
        })
        .collect();
    format!(
        "{}\n<section class='related'><h2>Related reading</h2><ul>{}</ul></section>",
        html, items
    )
}

/// Extracts a short quick answer from the first paragraph: the first two
/// sentences, capped at [`QUICK_ANSWER_MAX`] characters. Falls back to a
/// generic sentence when the markup has no paragraph.
pub fn extract_quick_answer(html: &str) -> String {
    let text = match PARAGRAPH.captures(html) {
        Some(caps) => collapse_whitespace(&strip_tags(&caps[1])),
        None => return QUICK_ANSWER_FALLBACK.to_owned(),
    };
    if text.is_empty() {
        return QUICK_ANSWER_FALLBACK.to_owned();
    }
    let answer = first_sentences(&text, 2);
    if answer.chars().count() > QUICK_ANSWER_MAX {
        answer.chars().take(QUICK_ANSWER_MAX).collect()
    } else {
        answer.to_owned()
    }
}

/// Extracts FAQ entries: finds the level-2 heading named `FAQ`, then treats
/// every following level-3 heading (up to the next level-2 heading) as one
/// question, answered by the first paragraph in its span. Entries with an
/// empty question or answer are dropped; capped at [`FAQ_LIMIT`].
pub fn extract_faq_items(html: &str) -> Vec<FaqItem> {
    let mut faq_body_start = None;
    for caps in H2.captures_iter(html) {
        if strip_tags(&caps[2]).eq_ignore_ascii_case("faq") {
            faq_body_start = Some(caps.get(0).map_or(0, |m| m.end()));
            break;
        }
    }
    let start = match faq_body_start {
        Some(start) => start,
        None => return Vec::new(),
    };

    let rest = &html[start..];
    let span = &rest[..H2_OPEN.find(rest).map_or(rest.len(), |m| m.start())];

    let questions: Vec<(usize, usize, String)> = H3
        .captures_iter(span)
        .map(|caps| {
            let whole = caps.get(0).expect("regex match has a group 0");
            (whole.start(), whole.end(), strip_tags(&caps[2]))
        })
        .collect();

    let mut items = Vec::new();
    for (i, (_, body_start, question)) in questions.iter().enumerate() {
        if items.len() >= FAQ_LIMIT {
            break;
        }
        let body_end = questions.get(i + 1).map_or(span.len(), |next| next.0);
        let body = &span[*body_start..body_end];
        let answer = PARAGRAPH
            .captures(body)
            .map(|caps| collapse_whitespace(&strip_tags(&caps[1])))
            .unwrap_or_default();
        let question = collapse_whitespace(question);
        if question.is_empty() || answer.is_empty() {
            continue;
        }
        items.push(FaqItem { question, answer });
    }
    items
}

/// Drops markup tags and trims the result.
pub fn strip_tags(html: &str) -> String {
    ANY_TAG.replace_all(html, "").trim().to_owned()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// Cuts `text` after `limit` sentence-ending punctuation marks that are
// followed by whitespace (or end the text).
fn first_sentences(text: &str, limit: usize) -> &str {
    let mut seen = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, ch)) = chars.next() {
        if matches!(ch, '.' | '!' | '?') {
            let boundary = match chars.peek() {
                None => true,
                Some((_, next)) => next.is_whitespace(),
            };
            if boundary {
                seen += 1;
                if seen == limit {
                    return &text[..i + ch.len_utf8()];
                }
            }
        }
    }
    text
}
