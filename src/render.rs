//! Pure page templating: given a [`Record`] plus transformed markup and
//! site-wide constants, produce complete HTML documents. No I/O happens
//! here — [`crate::site`] owns writing the results to disk.
//!
//! Pages are rendered with `gtmpl` templates. The built-in templates are
//! compiled in; a theme may supply replacement template sources
//! ([`Renderer::from_sources`]). Every text field is HTML-escaped before it
//! enters a template context; the article body and the JSON-LD blocks are
//! inserted pre-rendered.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::string::FromUtf8Error;

use gtmpl::{Context, Template, Value};
use serde_json::json;
use url::Url;

use crate::post::Record;
use crate::transform::{FaqItem, TocEntry};

/// How many records the home page lists.
pub const HOME_LIMIT: usize = 50;

/// How many records one tag archive page lists.
pub const TAG_PAGE_LIMIT: usize = 100;

/// How many tag chips the home page shows.
pub const CHIP_LIMIT: usize = 10;

/// Minimum number of TOC entries required before the block is rendered.
pub const TOC_MIN: usize = 2;

/// Renders post, home, and tag-archive documents for one site.
pub struct Renderer {
    base_url: Url,
    site_title: String,
    tagline: String,
    post_template: Template,
    index_template: Template,
    tag_template: Template,
}

/// Replacement template sources, e.g. loaded from a theme directory.
pub struct TemplateSources {
    pub post: String,
    pub index: String,
    pub tag: String,
}

impl Renderer {
    /// Creates a renderer with the built-in templates. `base_url` must be an
    /// absolute URL ending in `/` (the configuration layer normalizes this).
    pub fn new(base_url: Url, site_title: &str, tagline: &str) -> Result<Renderer> {
        Renderer::from_sources(
            base_url,
            site_title,
            tagline,
            TemplateSources {
                post: POST_TEMPLATE.to_owned(),
                index: INDEX_TEMPLATE.to_owned(),
                tag: TAG_TEMPLATE.to_owned(),
            },
        )
    }

    /// Creates a renderer from explicit template sources.
    pub fn from_sources(
        base_url: Url,
        site_title: &str,
        tagline: &str,
        sources: TemplateSources,
    ) -> Result<Renderer> {
        Ok(Renderer {
            base_url,
            site_title: site_title.to_owned(),
            tagline: tagline.to_owned(),
            post_template: parse_template(&sources.post)?,
            index_template: parse_template(&sources.index)?,
            tag_template: parse_template(&sources.tag)?,
        })
    }

    /// The absolute URL for a path relative to the site root.
    pub fn absolute(&self, relative: &str) -> Result<String> {
        Ok(self.base_url.join(relative)?.to_string())
    }

    /// The configured base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The configured site title.
    pub fn site_title(&self) -> &str {
        &self.site_title
    }

    /// Renders one complete post page.
    pub fn render_post(
        &self,
        record: &Record,
        alt_text: &str,
        body: &str,
        toc: &[TocEntry],
        faq: &[FaqItem],
        quick_answer: &str,
    ) -> Result<String> {
        let canonical = self.absolute(&record.url)?;
        let og_image = self.absolute(&record.hero)?;
        let tag_url = format!("tag/{}.html", record.tag);

        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("site_title".to_owned(), escape_html(&self.site_title).into());
        m.insert("title".to_owned(), escape_html(&record.title).into());
        m.insert(
            "description".to_owned(),
            escape_html(&record.description).into(),
        );
        m.insert("canonical".to_owned(), escape_html(&canonical).into());
        m.insert("og_image".to_owned(), escape_html(&og_image).into());
        m.insert("date".to_owned(), escape_html(&record.date).into());
        m.insert("tag".to_owned(), escape_html(&record.tag).into());
        m.insert("tag_url".to_owned(), escape_html(&tag_url).into());
        m.insert("hero".to_owned(), escape_html(&record.hero).into());
        m.insert("alt_text".to_owned(), escape_html(alt_text).into());
        m.insert("css".to_owned(), BASE_CSS.into());
        m.insert("body".to_owned(), body.into());
        m.insert("show_toc".to_owned(), Value::from(toc.len() >= TOC_MIN));
        m.insert(
            "toc".to_owned(),
            Value::Array(toc.iter().map(Value::from).collect()),
        );
        m.insert(
            "article_schema".to_owned(),
            self.article_schema(record, &canonical, &og_image, quick_answer)
                .into(),
        );
        m.insert(
            "faq_schema".to_owned(),
            match faq_schema(faq) {
                Some(schema) => schema.into(),
                None => Value::Nil,
            },
        );
        m.insert(
            "breadcrumb_schema".to_owned(),
            self.breadcrumb_schema(record, &canonical)?.into(),
        );

        execute(&self.post_template, Value::Object(m))
    }

    /// Renders the home page: tag chips grouped by frequency plus the most
    /// recent [`HOME_LIMIT`] records.
    pub fn render_home(&self, records: &[Record]) -> Result<String> {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("site_title".to_owned(), escape_html(&self.site_title).into());
        m.insert("tagline".to_owned(), escape_html(&self.tagline).into());
        m.insert(
            "canonical".to_owned(),
            escape_html(&self.absolute("index.html")?).into(),
        );
        m.insert("css".to_owned(), BASE_CSS.into());
        m.insert(
            "chips".to_owned(),
            Value::Array(
                top_tags(records)
                    .into_iter()
                    .map(|tag| {
                        let mut chip: HashMap<String, Value> = HashMap::new();
                        chip.insert("tag".to_owned(), escape_html(&tag).into());
                        chip.insert(
                            "url".to_owned(),
                            escape_html(&format!("tag/{}.html", tag)).into(),
                        );
                        Value::Object(chip)
                    })
                    .collect(),
            ),
        );
        m.insert(
            "items".to_owned(),
            Value::Array(
                records
                    .iter()
                    .take(HOME_LIMIT)
                    .map(Value::from)
                    .collect(),
            ),
        );
        execute(&self.index_template, Value::Object(m))
    }

    /// Renders one tag archive page for `group` (records already filtered to
    /// the tag, in index order).
    pub fn render_tag_page(&self, tag: &str, group: &[&Record]) -> Result<String> {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("site_title".to_owned(), escape_html(&self.site_title).into());
        m.insert("tag".to_owned(), escape_html(tag).into());
        m.insert(
            "canonical".to_owned(),
            escape_html(&self.absolute(&format!("tag/{}.html", tag))?).into(),
        );
        m.insert("css".to_owned(), BASE_CSS.into());
        m.insert(
            "items".to_owned(),
            Value::Array(
                group
                    .iter()
                    .take(TAG_PAGE_LIMIT)
                    .map(|r| Value::from(*r))
                    .collect(),
            ),
        );
        execute(&self.tag_template, Value::Object(m))
    }

    fn article_schema(
        &self,
        record: &Record,
        canonical: &str,
        og_image: &str,
        quick_answer: &str,
    ) -> String {
        json!({
            "@context": "https://schema.org",
            "@type": "Article",
            "headline": record.title,
            "description": record.description,
            "abstract": quick_answer,
            "datePublished": record.date,
            "dateModified": record.date,
            "author": {"@type": "Organization", "name": self.site_title},
            "mainEntityOfPage": canonical,
            "image": og_image,
            "about": record.tag,
        })
        .to_string()
    }

    fn breadcrumb_schema(&self, record: &Record, canonical: &str) -> Result<String> {
        Ok(json!({
            "@context": "https://schema.org",
            "@type": "BreadcrumbList",
            "itemListElement": [
                {
                    "@type": "ListItem",
                    "position": 1,
                    "name": "Home",
                    "item": self.absolute("index.html")?,
                },
                {
                    "@type": "ListItem",
                    "position": 2,
                    "name": record.tag,
                    "item": self.absolute(&format!("tag/{}.html", record.tag))?,
                },
                {
                    "@type": "ListItem",
                    "position": 3,
                    "name": record.title,
                    "item": canonical,
                },
            ],
        })
        .to_string())
    }
}

fn faq_schema(faq: &[FaqItem]) -> Option<String> {
    if faq.is_empty() {
        return None;
    }
    let entities: Vec<serde_json::Value> = faq
        .iter()
        .map(|item| {
            json!({
                "@type": "Question",
                "name": item.question,
                "acceptedAnswer": {"@type": "Answer", "text": item.answer},
            })
        })
        .collect();
    Some(
        json!({
            "@context": "https://schema.org",
            "@type": "FAQPage",
            "mainEntity": entities,
        })
        .to_string(),
    )
}

/// The home page's tag chips: distinct tags ordered by frequency (ties
/// alphabetical), capped at [`CHIP_LIMIT`].
fn top_tags(records: &[Record]) -> Vec<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for record in records {
        *counts.entry(record.tag.as_str()).or_insert(0) += 1;
    }
    let mut tags: Vec<(&str, usize)> = counts.into_iter().collect();
    tags.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    tags.into_iter()
        .take(CHIP_LIMIT)
        .map(|(tag, _)| tag.to_owned())
        .collect()
}

fn parse_template(source: &str) -> Result<Template> {
    let mut template = Template::default();
    template.parse(source).map_err(Error::Template)?;
    Ok(template)
}

fn execute(template: &Template, value: Value) -> Result<String> {
    let context = Context::from(value).map_err(Error::Template)?;
    let mut buf = Vec::new();
    template.execute(&mut buf, &context)?;
    String::from_utf8(buf).map_err(Error::Utf8)
}

/// Escapes text for interpolation into HTML text nodes and quoted attribute
/// values (both quote styles).
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}

/// The result of a fallible rendering operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error while templating a page.
#[derive(Debug)]
pub enum Error {
    /// An error parsing or executing a template.
    Template(String),

    /// An error joining a canonical URL onto the base URL.
    Url(url::ParseError),

    /// Template output that was not valid UTF-8.
    Utf8(FromUtf8Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Template(err) => err.fmt(f),
            Error::Url(err) => err.fmt(f),
            Error::Utf8(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Template(_) => None,
            Error::Url(err) => Some(err),
            Error::Utf8(err) => Some(err),
        }
    }
}

impl From<String> for Error {
    /// Converts a template error message ([`String`]) into an [`Error`].
    /// This allows us to use the `?` operator for template operations.
    fn from(err: String) -> Error {
        Error::Template(err)
    }
}

impl From<url::ParseError> for Error {
    /// Converts a [`url::ParseError`] into an [`Error`]. This allows us to
    /// use the `?` operator when building canonical URLs.
    fn from(err: url::ParseError) -> Error {
        Error::Url(err)
    }
}

const BASE_CSS: &str = "body{margin:0;background:#f8fafc;color:#0f172a;font-family:Arial,sans-serif;line-height:1.65;}\
.container{max-width:760px;margin:0 auto;padding:16px;}\
.header{margin-bottom:8px;}\
h1{font-size:1.75rem;line-height:1.2;margin:10px 0 12px;}\
h2{margin-top:22px;font-size:1.35rem;}\
p,li{font-size:1rem;}\
img{max-width:100%;height:auto;border-radius:12px;}\
a{color:#0f766e;text-decoration:none;}a:hover{text-decoration:underline;}\
.meta{color:#475569;font-size:.92rem;margin-bottom:12px;}\
.tag-row{display:flex;gap:8px;flex-wrap:wrap;margin:10px 0 16px;}\
.tag-pill{display:inline-block;background:#e2e8f0;color:#0f172a;border-radius:999px;padding:2px 10px;font-size:.82rem;}\
.toc,.related{background:#fff;border:1px solid #e2e8f0;border-radius:10px;padding:12px;margin:16px 0;}\
ul,ol{padding-left:22px;}";

const POST_TEMPLATE: &str = r#"<!doctype html>
<html lang='en'>
<head>
<meta charset='utf-8'>
<meta name='viewport' content='width=device-width, initial-scale=1'>
<title>{{.title}}</title>
<meta name='description' content='{{.description}}'>
<meta name='robots' content='index,follow'>
<link rel='canonical' href='{{.canonical}}'>
<meta property='og:type' content='article'>
<meta property='og:title' content='{{.title}}'>
<meta property='og:description' content='{{.description}}'>
<meta property='og:url' content='{{.canonical}}'>
<meta property='og:image' content='{{.og_image}}'>
<meta name='twitter:card' content='summary_large_image'>
<meta name='twitter:title' content='{{.title}}'>
<meta name='twitter:description' content='{{.description}}'>
<meta name='twitter:image' content='{{.og_image}}'>
<style>{{.css}}</style>
<script type='application/ld+json'>{{.article_schema}}</script>
{{if .faq_schema}}<script type='application/ld+json'>{{.faq_schema}}</script>
{{end}}<script type='application/ld+json'>{{.breadcrumb_schema}}</script>
</head>
<body>
<main class='container'>
<header class='header'><a href='index.html'>{{.site_title}}</a></header>
<article>
<h1>{{.title}}</h1>
<p class='meta'>{{.date}} &middot; <a class='tag-pill' href='{{.tag_url}}'>{{.tag}}</a></p>
<img src='{{.hero}}' alt='{{.alt_text}}' fetchpriority='high' loading='eager'>
{{if .show_toc}}<nav class='toc'><h2>Table of contents</h2><ol>{{range .toc}}<li><a href='#{{.id}}'>{{.text}}</a></li>{{end}}</ol></nav>
{{end}}{{.body}}
</article>
</main>
</body>
</html>"#;

const INDEX_TEMPLATE: &str = r#"<!doctype html>
<html lang='en'>
<head>
<meta charset='utf-8'>
<meta name='viewport' content='width=device-width, initial-scale=1'>
<title>{{.site_title}}</title>
<meta name='description' content='{{.tagline}}'>
<meta name='robots' content='index,follow'>
<link rel='canonical' href='{{.canonical}}'>
<style>{{.css}}</style>
</head>
<body>
<main class='container'>
<h1>{{.site_title}}</h1>
<p>{{.tagline}}</p>
<div class='tag-row'>{{range .chips}}<a class='tag-pill' href='{{.url}}'>{{.tag}}</a>{{end}}</div>
<ul>{{range .items}}<li><a href='{{.url}}'>{{.title}}</a> <small>{{.date}}</small> <a class='tag-pill' href='{{.tag_url}}'>{{.tag}}</a></li>{{end}}</ul>
</main>
</body>
</html>"#;

const TAG_TEMPLATE: &str = r#"<!doctype html>
<html lang='en'>
<head>
<meta charset='utf-8'>
<meta name='viewport' content='width=device-width, initial-scale=1'>
<title>{{.tag}} posts | {{.site_title}}</title>
<meta name='description' content='Newest {{.tag}} posts'>
<meta name='robots' content='index,follow'>
<link rel='canonical' href='{{.canonical}}'>
<style>{{.css}}</style>
</head>
<body>
<main class='container'>
<p><a href='../index.html'>Back to home</a></p>
<h1>{{.tag}} posts</h1>
<p>Explore practical {{.tag}} guides, newest first.</p>
<ul>{{range .items}}<li><a href='../{{.url}}'>{{.title}}</a> <small>{{.date}}</small></li>{{end}}</ul>
</main>
</body>
</html>"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer() -> Renderer {
        Renderer::new(
            Url::parse("https://example.org/site/").unwrap(),
            "Example Notes",
            "Practical notes.",
        )
        .unwrap()
    }

    fn record(slug: &str, tag: &str) -> Record {
        Record {
            slug: slug.to_owned(),
            title: format!("Title {}", slug),
            description: "A description.".to_owned(),
            date: "2026-02-03".to_owned(),
            url: format!("{}.html", slug),
            hero: format!("assets/{}.jpg", slug),
            tag: tag.to_owned(),
        }
    }

    fn toc(n: usize) -> Vec<TocEntry> {
        (0..n)
            .map(|i| TocEntry {
                text: format!("Section {}", i),
                id: format!("section-{}", i),
            })
            .collect()
    }

    #[test]
    fn test_render_post_escapes_model_text() {
        let mut rec = record("one", "sleep");
        rec.title = "Sleep <script>alert(1)</script> & more".to_owned();
        let page = renderer()
            .render_post(&rec, "an 'image'", "<p>body</p>", &[], &[], "Quick.")
            .unwrap();
        assert!(!page.contains("<script>alert"));
        assert!(page.contains("&lt;script&gt;"));
        assert!(page.contains("&amp; more"));
        assert!(page.contains("an &#x27;image&#x27;"));
        // the body is inserted unescaped
        assert!(page.contains("<p>body</p>"));
    }

    #[test]
    fn test_render_post_toc_gating() {
        let rec = record("one", "sleep");
        let r = renderer();
        let without = r
            .render_post(&rec, "alt", "<p>b</p>", &toc(1), &[], "Q.")
            .unwrap();
        assert!(!without.contains("class='toc'"));
        let with = r
            .render_post(&rec, "alt", "<p>b</p>", &toc(3), &[], "Q.")
            .unwrap();
        assert!(with.contains("class='toc'"));
        assert!(with.contains("href='#section-2'"));
    }

    #[test]
    fn test_render_post_structured_data() {
        let rec = record("one", "sleep");
        let faq = vec![FaqItem {
            question: "What helps?".to_owned(),
            answer: "Routine.".to_owned(),
        }];
        let page = renderer()
            .render_post(&rec, "alt", "<p>b</p>", &[], &faq, "Quick answer.")
            .unwrap();
        assert!(page.contains(r#""@type":"Article""#));
        assert!(page.contains(r#""@type":"FAQPage""#));
        assert!(page.contains(r#""@type":"BreadcrumbList""#));
        assert!(page.contains("Quick answer."));

        let without_faq = renderer()
            .render_post(&rec, "alt", "<p>b</p>", &[], &[], "Q.")
            .unwrap();
        assert!(!without_faq.contains("FAQPage"));
    }

    #[test]
    fn test_render_post_canonical_and_metadata() {
        let rec = record("one", "sleep");
        let page = renderer()
            .render_post(&rec, "alt", "<p>b</p>", &[], &[], "Q.")
            .unwrap();
        assert!(page.contains("href='https://example.org/site/one.html'"));
        assert!(page.contains("content='https://example.org/site/assets/one.jpg'"));
        assert!(page.contains("name='twitter:card' content='summary_large_image'"));
        assert!(page.contains("href='tag/sleep.html'"));
    }

    #[test]
    fn test_render_home_chips_by_frequency_then_name() {
        let records = vec![
            record("a", "gut"),
            record("b", "sleep"),
            record("c", "sleep"),
            record("d", "weight"),
        ];
        let page = renderer().render_home(&records).unwrap();
        let sleep = page.find("href='tag/sleep.html'").unwrap();
        let gut = page.find("href='tag/gut.html'").unwrap();
        let weight = page.find("href='tag/weight.html'").unwrap();
        assert!(sleep < gut && gut < weight);
    }

    #[test]
    fn test_render_tag_page_links_up_one_level() {
        let rec = record("one", "sleep");
        let group = vec![&rec];
        let page = renderer().render_tag_page("sleep", &group).unwrap();
        assert!(page.contains("Explore practical sleep guides"));
        assert!(page.contains("href='../one.html'"));
        assert!(page.contains("href='../index.html'"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let records = vec![record("a", "gut"), record("b", "sleep")];
        let r = renderer();
        assert_eq!(
            r.render_home(&records).unwrap(),
            r.render_home(&records).unwrap()
        );
    }
}
