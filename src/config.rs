//! Project configuration. A site is described by a `stele.yaml` file which
//! is discovered by walking up from the working directory; paths inside it
//! resolve against the directory containing it.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use serde::Deserialize;
use url::Url;

use crate::render::{Renderer, TemplateSources};
use crate::util::read_to_string;

/// Name of the project file.
pub const PROJECT_FILE: &str = "stele.yaml";

const DEFAULT_SITE_TITLE: &str = "Practical US Health Notes";
const DEFAULT_TAGLINE: &str = "Informational health content for US readers.";
const DEFAULT_SITE_DIRECTORY: &str = "docs";
const DEFAULT_STATE_FILE: &str = "generated/state.json";

/// The author credited in the Atom feed.
#[derive(Clone, Debug, Deserialize)]
pub struct Author {
    pub name: String,

    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Deserialize)]
struct Project {
    base_url: Url,

    #[serde(default = "default_site_title")]
    site_title: String,

    #[serde(default = "default_tagline")]
    tagline: String,

    #[serde(default = "default_site_directory")]
    site_directory: PathBuf,

    #[serde(default = "default_state_file")]
    state_file: PathBuf,

    #[serde(default)]
    author: Option<Author>,

    #[serde(default)]
    theme: Option<Theme>,
}

#[derive(Deserialize)]
struct Theme {
    post_template: Vec<PathBuf>,
    index_template: Vec<PathBuf>,
    tag_template: Vec<PathBuf>,
}

fn default_site_title() -> String {
    DEFAULT_SITE_TITLE.to_owned()
}

fn default_tagline() -> String {
    DEFAULT_TAGLINE.to_owned()
}

fn default_site_directory() -> PathBuf {
    PathBuf::from(DEFAULT_SITE_DIRECTORY)
}

fn default_state_file() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_FILE)
}

/// Resolved configuration: everything the CLI needs to construct a
/// [`Renderer`] and a site builder.
pub struct Config {
    /// The canonical base URL, normalized to end in `/`.
    pub base_url: Url,
    pub site_title: String,
    pub tagline: String,

    /// The site root (where pages and the index live), absolute or relative
    /// to the invocation directory.
    pub site_directory: PathBuf,

    /// Where the run state lives.
    pub state_file: PathBuf,

    pub author: Option<Author>,

    theme: Option<ThemeFiles>,
}

struct ThemeFiles {
    post: Vec<PathBuf>,
    index: Vec<PathBuf>,
    tag: Vec<PathBuf>,
}

impl Config {
    /// Finds the project file in `dir` or the nearest ancestor directory and
    /// loads it.
    pub fn from_directory(dir: &Path) -> Result<Config> {
        let path = dir.join(PROJECT_FILE);
        if path.exists() {
            Config::from_project_file(&path)
        } else {
            match dir.parent() {
                Some(parent) => Config::from_directory(parent),
                None => Err(anyhow!(
                    "Could not find `{}` in any parent directory",
                    PROJECT_FILE
                )),
            }
        }
    }

    /// Loads configuration from an explicit project file path.
    pub fn from_project_file(path: &Path) -> Result<Config> {
        use crate::util::open;
        let project: Project = serde_yaml::from_reader(open(path, "project")?)?;
        let project_root = path.parent().ok_or_else(|| {
            anyhow!(
                "Can't get parent directory for provided project file path '{}'",
                path.display()
            )
        })?;

        // Url::join treats a base without a trailing slash as a file, which
        // would drop the last path segment from every canonical URL.
        let mut base_url = project.base_url;
        if !base_url.path().ends_with('/') {
            let normalized = format!("{}/", base_url.path());
            base_url.set_path(&normalized);
        }

        Ok(Config {
            base_url,
            site_title: project.site_title,
            tagline: project.tagline,
            site_directory: project_root.join(project.site_directory),
            state_file: project_root.join(project.state_file),
            author: project.author,
            theme: project.theme.map(|theme| ThemeFiles {
                post: resolve(project_root, theme.post_template),
                index: resolve(project_root, theme.index_template),
                tag: resolve(project_root, theme.tag_template),
            }),
        })
    }

    /// Builds the renderer for this site: the theme's templates when one is
    /// configured, the built-in templates otherwise.
    pub fn renderer(&self) -> Result<Renderer> {
        let renderer = match &self.theme {
            None => Renderer::new(self.base_url.clone(), &self.site_title, &self.tagline)?,
            Some(theme) => Renderer::from_sources(
                self.base_url.clone(),
                &self.site_title,
                &self.tagline,
                TemplateSources {
                    post: concat_template_files(&theme.post)?,
                    index: concat_template_files(&theme.index)?,
                    tag: concat_template_files(&theme.tag)?,
                },
            )?,
        };
        Ok(renderer)
    }
}

fn resolve(project_root: &Path, paths: Vec<PathBuf>) -> Vec<PathBuf> {
    paths
        .into_iter()
        .map(|relpath| project_root.join(relpath))
        .collect()
}

// Loads the template file contents and concatenates them in order into one
// template source.
fn concat_template_files(files: &[PathBuf]) -> Result<String> {
    let mut contents = String::new();
    for file in files {
        contents.push_str(&read_to_string(file, "template")?);
        contents.push(' ');
    }
    Ok(contents)
}
