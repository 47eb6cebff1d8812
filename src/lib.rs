//! The library code for the `stele` publish engine. The architecture can be
//! generally broken down into two distinct steps:
//!
//! 1. Publishing a single generated article ([`crate::site::Builder::publish`]):
//!    validate the generated post, transform its markup ([`crate::transform`]),
//!    render the post page ([`crate::render`]), and merge the new record into
//!    the post index ([`crate::store`]).
//! 2. Rebuilding the derived site state
//!    ([`crate::site::Builder::rebuild_all`]): regenerate the home page, one
//!    archive page per tag, the sitemap, the robots file, and the Atom feed
//!    from the current index.
//!
//! Of the two, the second step carries the invariants: it is a pure function
//! of the index plus the site configuration, so rebuilding twice from the
//! same index produces byte-identical output. That is what lets the
//! maintenance flows (delete a post, repair broken links) reuse it without
//! going through a publish.
//!
//! The maintenance flows themselves live in [`crate::links`] (scan rendered
//! pages for broken same-site links, rewrite them to the home page) and on
//! [`crate::site::Builder`] (`delete`, `repair`). Cross-run counters used to
//! bias content-mode selection live in [`crate::state`].

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod config;
pub mod feed;
pub mod links;
pub mod post;
pub mod render;
pub mod site;
pub mod slug;
pub mod state;
pub mod store;
pub mod transform;
pub mod util;
pub mod value;
