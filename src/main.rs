use std::path::PathBuf;
use std::process;

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use stele::config::Config;
use stele::links;
use stele::post::GeneratedPost;
use stele::site::Builder;
use stele::slug;
use stele::state::{Mode, RunState};
use stele::util;

#[derive(Parser)]
#[command(
    name = "stele",
    version,
    about = "Publish and maintain a static article site"
)]
struct Cli {
    /// Directory to search (upward) for the project file.
    #[arg(long, default_value = ".")]
    project: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Publish a generated post and rebuild all derived site state.
    Publish {
        /// Path to the generated post JSON file.
        #[arg(long)]
        post: PathBuf,

        /// Site-root-relative path of the hero image.
        #[arg(long)]
        hero: String,

        /// Run date; defaults to today (UTC).
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Record this run as promotional in the run state.
        #[arg(long)]
        offer: bool,

        /// Topic slug to remember in the run state.
        #[arg(long)]
        topic: Option<String>,
    },

    /// Regenerate every derived artifact from the current post index.
    Rebuild,

    /// Report broken internal links; exits non-zero when any are found.
    Validate,

    /// Rewrite broken links, prune dangling index entries, and rebuild.
    Repair,

    /// Remove a post from the index and delete its page file.
    Delete {
        #[arg(long)]
        slug: String,

        /// Also delete the post's hero image.
        #[arg(long)]
        delete_hero: bool,
    },

    /// Print the content mode to use for the next run.
    Mode,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    // walk-up discovery needs an absolute starting point
    let project_dir = cli.project.canonicalize()?;
    let config = Config::from_directory(&project_dir)?;
    let renderer = config.renderer()?;
    let mut builder = Builder::new(&config.site_directory, &renderer);
    builder.author = config.author.clone();

    match cli.command {
        Command::Publish {
            post,
            hero,
            date,
            offer,
            topic,
        } => {
            let mut generated: GeneratedPost =
                serde_json::from_str(&util::read_to_string(&post, "post")?)?;
            let run_date = date.unwrap_or_else(|| Utc::now().date_naive());

            // avoid near-term slug collisions by suffixing the run date
            let mut state = RunState::load(&config.state_file);
            if state.seen_recently(&slug::normalize(&generated.slug)) {
                generated.slug = format!("{}-{}", generated.slug, run_date.format("%m%d"));
            }

            let record = builder.publish(&generated, &hero, run_date)?;

            let mode = if offer { Mode::Offer } else { Mode::Info };
            state.note_run(mode, topic.as_deref(), &record.slug, &record.date);
            state.save(&config.state_file)?;
            println!("published {}", record.url);
        }
        Command::Rebuild => {
            let records = builder.load_index()?;
            builder.rebuild_all(&records)?;
            println!("rebuilt site state for {} posts", records.len());
        }
        Command::Validate => {
            let findings = links::validate(&config.site_directory)?;
            if findings.is_empty() {
                println!("OK: no broken internal links found.");
            } else {
                println!("BROKEN LINKS FOUND:");
                for finding in &findings {
                    println!(" - {}", finding);
                }
                process::exit(1);
            }
        }
        Command::Repair => {
            let summary = builder.repair()?;
            println!(
                "repair: posts kept={} dropped={} files rewritten={}",
                summary.kept, summary.dropped, summary.rewritten_files
            );
        }
        Command::Delete { slug, delete_hero } => match builder.delete(&slug, delete_hero)? {
            Some(record) => println!("deleted {}", record.url),
            None => println!("no index entry for `{}`; derived pages rebuilt", slug),
        },
        Command::Mode => {
            let state = RunState::load(&config.state_file);
            println!("{}", state.choose_mode(&mut rand::thread_rng()).as_str());
        }
    }
    Ok(())
}
