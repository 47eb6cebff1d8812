//! Detects and fixes broken same-site navigational links in the rendered
//! output. Validation scans every HTML file in the site root (top-level
//! pages plus one level of subpages, i.e. `tag/`), extracts `href` targets,
//! and reports local `.html` links that do not resolve to a file — or that
//! resolve outside the site root, which is reported but never auto-fixed.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::warn;
use walkdir::WalkDir;

static HREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)href\s*=\s*(?:"([^"]+)"|'([^']+)')"#).unwrap());

// Non-page assets are outside the validator's remit.
const ASSET_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".webp", ".svg", ".css", ".js", ".pdf",
];

/// How deep below the site root pages live: top-level files plus one level
/// of subdirectories (`tag/`).
const MAX_DEPTH: usize = 2;

/// One broken-link finding.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Finding {
    /// The referencing file, relative to the site root.
    pub file: String,

    /// The raw `href` value as written in the file.
    pub href: String,

    pub reason: Reason,
}

/// Why a link was flagged.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Reason {
    /// The target resolves outside the site root. Never auto-fixed.
    EscapesRoot,

    /// The target resolves inside the site root but no such file exists.
    Missing(String),
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.reason {
            Reason::EscapesRoot => {
                write!(f, "{} -> {} (escapes the site root)", self.file, self.href)
            }
            Reason::Missing(target) => {
                write!(f, "{} -> {} (missing: {})", self.file, self.href, target)
            }
        }
    }
}

/// Scans the site for broken same-site links. Findings are sorted and
/// deduplicated. External links, bare anchors, `mailto:`/`tel:` and asset
/// references are skipped.
pub fn validate(site_root: &Path) -> io::Result<Vec<Finding>> {
    let root = fs::canonicalize(site_root)?;
    let mut findings = Vec::new();

    for file in html_files(&root)? {
        let text = String::from_utf8_lossy(&fs::read(&file)?).into_owned();
        let rel_file = relative_display(&file, &root);
        let dir = file.parent().map(Path::to_owned).unwrap_or_else(|| root.clone());

        for caps in HREF.captures_iter(&text) {
            let href = match href_capture(&caps) {
                Some((_, href)) => href,
                None => continue,
            };
            let target = match local_html_target(href) {
                Some(target) => target,
                None => continue,
            };
            match normalize_path(&dir.join(&target)) {
                Some(resolved) if resolved.starts_with(&root) => {
                    if !resolved.exists() {
                        findings.push(Finding {
                            file: rel_file.clone(),
                            href: href.to_owned(),
                            reason: Reason::Missing(relative_display(&resolved, &root)),
                        });
                    }
                }
                _ => findings.push(Finding {
                    file: rel_file.clone(),
                    href: href.to_owned(),
                    reason: Reason::EscapesRoot,
                }),
            }
        }
    }

    findings.sort();
    findings.dedup();
    Ok(findings)
}

/// The set of rendered pages currently on disk, as site-root-relative paths
/// (`index.html`, `foo.html`, `tag/sleep.html`).
pub fn existing_pages(site_root: &Path) -> io::Result<BTreeSet<String>> {
    Ok(html_files(site_root)?
        .iter()
        .filter_map(|file| file.strip_prefix(site_root).ok())
        .map(|rel| rel.to_string_lossy().into_owned())
        .collect())
}

/// Rewrites broken local `.html` links in one file to the home page —
/// `index.html` from top-level files, `../index.html` from subpages.
/// Links that escape the site root are left alone (the validator reports
/// them instead). Returns whether the file changed.
pub fn rewrite_broken_links(
    file: &Path,
    site_root: &Path,
    existing: &BTreeSet<String>,
) -> io::Result<bool> {
    let text = String::from_utf8_lossy(&fs::read(file)?).into_owned();
    let rel_dir = file
        .parent()
        .and_then(|dir| dir.strip_prefix(site_root).ok())
        .unwrap_or_else(|| Path::new(""))
        .to_owned();
    let home = if rel_dir.as_os_str().is_empty() {
        "index.html"
    } else {
        "../index.html"
    };

    let rewritten = HREF.replace_all(&text, |caps: &Captures| {
        let (quote, href) = match href_capture(caps) {
            Some(pair) => pair,
            None => return caps[0].to_string(),
        };
        let target = match local_html_target(href) {
            Some(target) => target,
            None => return caps[0].to_string(),
        };
        match normalize_path(&rel_dir.join(&target)) {
            Some(resolved) if existing.contains(&resolved.to_string_lossy().into_owned()) => {
                caps[0].to_string()
            }
            Some(_) => {
                warn!(file = %file.display(), href, "rewriting broken link to home");
                format!("href={quote}{home}{quote}")
            }
            None => caps[0].to_string(),
        }
    });

    if rewritten.as_ref() != text.as_str() {
        fs::write(file, rewritten.as_bytes())?;
        Ok(true)
    } else {
        Ok(false)
    }
}

/// Every HTML file in the site root, top-level and one subdirectory deep.
pub fn html_files(site_root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for result in WalkDir::new(site_root).max_depth(MAX_DEPTH).sort_by_file_name() {
        let entry = result.map_err(io::Error::from)?;
        if entry.file_type().is_file()
            && entry.file_name().to_string_lossy().ends_with(".html")
        {
            files.push(entry.path().to_owned());
        }
    }
    Ok(files)
}

fn relative_display(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

fn href_capture<'t>(caps: &Captures<'t>) -> Option<(char, &'t str)> {
    if let Some(m) = caps.get(1) {
        return Some(('"', m.as_str()));
    }
    caps.get(2).map(|m| ('\'', m.as_str()))
}

// Reduces an href to a validated local `.html` target, or `None` when the
// link is outside the validator's remit.
fn local_html_target(href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("http://")
        || href.starts_with("https://")
    {
        return None;
    }
    let lower = href.to_lowercase();
    if ASSET_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        return None;
    }

    // strip fragment and query
    let cleaned = href.split(['#', '?']).next().unwrap_or("").trim();
    if cleaned.is_empty() || !cleaned.to_lowercase().ends_with(".html") {
        return None;
    }
    Some(cleaned.to_owned())
}

// Lexically resolves `.` and `..` without touching the filesystem (the
// target may not exist). Returns `None` when `..` climbs past the start of
// the path.
fn normalize_path(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    Some(out)
}
