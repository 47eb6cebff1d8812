//! The site state builder: the single authority that keeps the post index
//! and the derived artifacts (home page, tag archive pages, sitemap, robots
//! file, Atom feed) mutually consistent.
//!
//! [`Builder::publish`] handles one new article: transform, render, write
//! the post page, merge the record into the index, then rebuild everything
//! derived. [`Builder::rebuild_all`] is a pure function of the index plus
//! the site configuration — rebuilding twice from the same index produces
//! byte-identical output — which is what lets [`Builder::delete`] and
//! [`Builder::repair`] reuse it directly.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use tracing::info;

use crate::config::Author;
use crate::feed::{self, Error as FeedError, FeedConfig};
use crate::links;
use crate::post::{self, GeneratedPost, InvalidPost, Record};
use crate::render::{escape_html, Error as RenderError, Renderer};
use crate::slug;
use crate::store::{Error as StoreError, PostStore, MAX_RECORDS};
use crate::transform;

/// Builds and maintains one site rooted at `site_root`.
pub struct Builder<'a> {
    site_root: &'a Path,
    renderer: &'a Renderer,
    store: PostStore,

    /// Optional author credited in the Atom feed.
    pub author: Option<Author>,
}

/// What a [`Builder::repair`] pass did.
#[derive(Debug, PartialEq, Eq)]
pub struct RepairSummary {
    /// Index entries whose page file still exists.
    pub kept: usize,

    /// Index entries dropped because their page file was gone.
    pub dropped: usize,

    /// HTML files whose broken links were rewritten.
    pub rewritten_files: usize,
}

impl<'a> Builder<'a> {
    pub fn new(site_root: &'a Path, renderer: &'a Renderer) -> Builder<'a> {
        Builder {
            site_root,
            renderer,
            store: PostStore::new(site_root),
            author: None,
        }
    }

    /// The current post index, newest first.
    pub fn load_index(&self) -> Result<Vec<Record>> {
        Ok(self.store.load()?)
    }

    /// Publishes one generated article: validates it, transforms its markup,
    /// renders and writes the post page, merges the new record into the
    /// index (replace-by-slug, move-to-front), and rebuilds all derived
    /// artifacts. An invalid post aborts before anything is written.
    pub fn publish(
        &self,
        post: &GeneratedPost,
        hero: &str,
        run_date: NaiveDate,
    ) -> Result<Record> {
        post.validate()?;

        let records = self.store.load()?;
        let slug = slug::normalize(&post.slug);
        let tag = post.normalized_tag();
        let related: Vec<Record> = post::related(&records, &tag, &slug)
            .into_iter()
            .cloned()
            .collect();
        let related: Vec<&Record> = related.iter().collect();

        let (body, toc) = transform::assign_heading_anchors(&post.html);
        let body = transform::resolve_internal_placeholders(&body, &related);
        let body = transform::append_related_section(&body, &related);
        let quick_answer = transform::extract_quick_answer(&post.html);
        let faq = transform::extract_faq_items(&post.html);

        let record = Record {
            url: format!("{}.html", slug),
            slug,
            title: post.title.clone(),
            description: post.meta_description.clone(),
            date: run_date.format("%Y-%m-%d").to_string(),
            hero: hero.to_owned(),
            tag,
        };

        let page =
            self.renderer
                .render_post(&record, &post.alt_text, &body, &toc, &faq, &quick_answer)?;
        fs::create_dir_all(self.site_root)?;
        fs::write(self.site_root.join(&record.url), page)?;

        let merged = PostStore::merge(records, record.clone());
        self.rebuild_all(&merged)?;
        info!(slug = %record.slug, tag = %record.tag, "published post");
        Ok(record)
    }

    /// Regenerates every derived artifact from `records`: persists the
    /// (capped) index, then writes the home page, the tag archive pages,
    /// `sitemap.xml`, `robots.txt`, and `feed.atom`. Pure in the index: the
    /// same records produce the same bytes.
    pub fn rebuild_all(&self, records: &[Record]) -> Result<()> {
        self.store.save(records)?;
        let records = &records[..records.len().min(MAX_RECORDS)];

        fs::create_dir_all(self.site_root)?;
        fs::write(
            self.site_root.join("index.html"),
            self.renderer.render_home(records)?,
        )?;
        let tag_pages = self.write_tag_pages(records)?;
        self.write_sitemap(records, &tag_pages)?;
        self.write_robots()?;
        self.write_feed(records)?;
        info!(posts = records.len(), tags = tag_pages.len(), "rebuilt site state");
        Ok(())
    }

    /// Removes a post from the index, deletes its page file (and optionally
    /// its hero asset), and rebuilds. Returns the removed record, if the
    /// slug was indexed.
    pub fn delete(&self, slug: &str, delete_hero: bool) -> Result<Option<Record>> {
        let records = self.store.load()?;
        let mut removed = None;
        let mut kept = Vec::with_capacity(records.len());
        for record in records {
            if record.slug == slug && removed.is_none() {
                removed = Some(record);
            } else {
                kept.push(record);
            }
        }

        let page = self.site_root.join(format!("{}.html", slug));
        if page.exists() {
            fs::remove_file(&page)?;
        }
        if delete_hero {
            if let Some(record) = &removed {
                if !record.hero.is_empty() {
                    let hero = self.site_root.join(&record.hero);
                    if hero.is_file() {
                        fs::remove_file(&hero)?;
                    }
                }
            }
        }

        self.rebuild_all(&kept)?;
        if let Some(record) = &removed {
            info!(slug = %record.slug, "deleted post");
        }
        Ok(removed)
    }

    /// Repairs the site after manual edits or partial failures: drops index
    /// entries whose page file no longer exists, rewrites broken local
    /// links to the home page, and rebuilds from the cleaned index. The two
    /// dangling conditions — indexed-but-missing files and
    /// on-disk-but-unindexed files — are checked independently: pruning
    /// consults the disk, link rewriting consults the disk, and neither
    /// consults the index.
    pub fn repair(&self) -> Result<RepairSummary> {
        let records = self.store.load()?;
        let existing = links::existing_pages(self.site_root)?;

        let total = records.len();
        let kept: Vec<Record> = records
            .into_iter()
            .filter(|record| existing.contains(&record.url))
            .collect();
        let dropped = total - kept.len();

        let mut rewritten_files = 0;
        for file in links::html_files(self.site_root)? {
            if links::rewrite_broken_links(&file, self.site_root, &existing)? {
                rewritten_files += 1;
            }
        }

        self.rebuild_all(&kept)?;
        info!(kept = kept.len(), dropped, rewritten_files, "repaired site");
        Ok(RepairSummary {
            kept: kept.len(),
            dropped,
            rewritten_files,
        })
    }

    // One archive page per distinct tag, in lexicographic tag order.
    // Returns (site-root-relative URL, lastmod) per page for the sitemap.
    // The directory is cleared first so tags no longer present in the index
    // don't leave stale archive pages behind.
    fn write_tag_pages(&self, records: &[Record]) -> Result<Vec<(String, String)>> {
        let tag_dir = self.site_root.join("tag");
        rmdir(&tag_dir)?;
        fs::create_dir_all(&tag_dir)?;

        let mut grouped: BTreeMap<&str, Vec<&Record>> = BTreeMap::new();
        for record in records {
            grouped.entry(record.tag.as_str()).or_default().push(record);
        }

        let mut pages = Vec::with_capacity(grouped.len());
        for (tag, group) in &grouped {
            let file_name = format!("{}.html", tag);
            fs::write(
                tag_dir.join(&file_name),
                self.renderer.render_tag_page(*tag, group.as_slice())?,
            )?;
            // groups preserve index order, so the first entry is newest
            pages.push((format!("tag/{}", file_name), group[0].date.clone()));
        }
        Ok(pages)
    }

    fn write_sitemap(&self, records: &[Record], tag_pages: &[(String, String)]) -> Result<()> {
        let mut rows = String::new();
        match records.first() {
            Some(newest) => rows.push_str(&format!(
                "<url><loc>{}</loc><lastmod>{}</lastmod></url>",
                self.renderer.absolute("index.html")?,
                newest.date,
            )),
            None => rows.push_str(&format!(
                "<url><loc>{}</loc></url>",
                self.renderer.absolute("index.html")?,
            )),
        }
        for record in records {
            rows.push_str(&format!(
                "<url><loc>{}</loc><lastmod>{}</lastmod></url>",
                escape_html(&self.renderer.absolute(&record.url)?),
                record.date,
            ));
        }
        for (url, lastmod) in tag_pages {
            rows.push_str(&format!(
                "<url><loc>{}</loc><lastmod>{}</lastmod></url>",
                escape_html(&self.renderer.absolute(url)?),
                lastmod,
            ));
        }

        let xml = format!(
            "<?xml version='1.0' encoding='UTF-8'?>\n\
             <urlset xmlns='http://www.sitemaps.org/schemas/sitemap/0.9'>{}</urlset>",
            rows
        );
        fs::write(self.site_root.join("sitemap.xml"), xml)?;
        Ok(())
    }

    fn write_robots(&self) -> Result<()> {
        let robots = format!(
            "User-agent: *\nAllow: /\nSitemap: {}\n",
            self.renderer.absolute("sitemap.xml")?,
        );
        fs::write(self.site_root.join("robots.txt"), robots)?;
        Ok(())
    }

    fn write_feed(&self, records: &[Record]) -> Result<()> {
        let config = FeedConfig {
            title: self.renderer.site_title().to_owned(),
            id: self.renderer.base_url().to_string(),
            author: self.author.clone(),
            home_page: self.renderer.absolute("index.html")?,
        };
        feed::write_feed(
            config,
            records,
            fs::File::create(self.site_root.join("feed.atom"))?,
        )?;
        Ok(())
    }
}

fn rmdir(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(x) => Ok(x),
        Err(e) => match e.kind() {
            std::io::ErrorKind::NotFound => Ok(()),
            _ => Err(Error::Io(e)),
        },
    }
}

/// The result of a fallible site operation.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for building and maintaining a site. Errors can come from
/// validation, the index store, rendering, the feed, or other I/O.
#[derive(Debug)]
pub enum Error {
    /// Returned when a generated post fails validation. Nothing has been
    /// written when this is returned.
    InvalidPost(InvalidPost),

    /// Returned for errors reading or writing the post index.
    Store(StoreError),

    /// Returned for errors templating a page.
    Render(RenderError),

    /// Returned for errors writing the feed.
    Feed(FeedError),

    /// Returned for other I/O errors.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::InvalidPost(err) => err.fmt(f),
            Error::Store(err) => err.fmt(f),
            Error::Render(err) => err.fmt(f),
            Error::Feed(err) => err.fmt(f),
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidPost(err) => Some(err),
            Error::Store(err) => Some(err),
            Error::Render(err) => Some(err),
            Error::Feed(err) => Some(err),
            Error::Io(err) => Some(err),
        }
    }
}

impl From<InvalidPost> for Error {
    /// Converts [`InvalidPost`]s into [`Error`]. This allows us to use the
    /// `?` operator after validating a post.
    fn from(err: InvalidPost) -> Error {
        Error::InvalidPost(err)
    }
}

impl From<StoreError> for Error {
    /// Converts [`StoreError`]s into [`Error`]. This allows us to use the
    /// `?` operator for index operations.
    fn from(err: StoreError) -> Error {
        Error::Store(err)
    }
}

impl From<RenderError> for Error {
    /// Converts [`RenderError`]s into [`Error`]. This allows us to use the
    /// `?` operator for rendering operations.
    fn from(err: RenderError) -> Error {
        Error::Render(err)
    }
}

impl From<FeedError> for Error {
    /// Converts [`FeedError`]s into [`Error`]. This allows us to use the
    /// `?` operator for feed operations.
    fn from(err: FeedError) -> Error {
        Error::Feed(err)
    }
}

impl From<std::io::Error> for Error {
    /// Converts [`std::io::Error`]s into [`Error`]. This allows us to use
    /// the `?` operator.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}
