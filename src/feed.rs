//! Support for creating an Atom feed from the post index. The feed's
//! `updated` timestamp comes from the newest record rather than the clock so
//! that rebuilding from the same index is byte-identical.

use std::fmt;
use std::io::Write;

use atom_syndication::{Entry, Error as AtomError, Feed, FixedDateTime, Link, Person, Text};
use chrono::{NaiveDate, NaiveTime, ParseError, TimeZone, Utc};

use crate::config::Author;
use crate::post::Record;

/// Bundled configuration for creating a feed.
pub struct FeedConfig {
    pub title: String,
    pub id: String,
    pub author: Option<Author>,
    pub home_page: String,
}

/// Creates a feed from some configuration ([`FeedConfig`]) and the post
/// index and writes the result to a [`std::io::Write`]. This function takes
/// ownership of the provided [`FeedConfig`].
pub fn write_feed<W: Write>(config: FeedConfig, records: &[Record], w: W) -> Result<()> {
    feed(config, records)?.write_to(w)?;
    Ok(())
}

fn feed(config: FeedConfig, records: &[Record]) -> Result<Feed> {
    let mut feed = Feed::default();
    feed.set_entries(feed_entries(&config, records)?);
    feed.set_title(Text::plain(config.title));
    feed.set_id(config.id);
    feed.set_updated(newest_date(records)?);
    feed.set_authors(author_to_people(config.author));
    let mut link = Link::default();
    link.set_href(config.home_page);
    link.set_rel("alternate");
    feed.set_links(vec![link]);
    Ok(feed)
}

fn feed_entries(config: &FeedConfig, records: &[Record]) -> Result<Vec<Entry>> {
    let mut entries: Vec<Entry> = Vec::with_capacity(records.len());
    for record in records {
        let date = record_date(record)?;
        let loc = format!("{}{}", config.id, record.url);

        let mut link = Link::default();
        link.set_href(loc.clone());
        link.set_rel("alternate");

        let mut entry = Entry::default();
        entry.set_id(loc);
        entry.set_title(Text::plain(record.title.clone()));
        entry.set_updated(date);
        entry.set_published(Some(date));
        entry.set_authors(author_to_people(config.author.clone()));
        entry.set_links(vec![link]);
        entry.set_summary(Some(Text::plain(record.description.clone())));
        entries.push(entry);
    }
    Ok(entries)
}

// Records carry dates only at day precision; the feed wants a full
// timestamp, so midnight UTC it is.
fn record_date(record: &Record) -> Result<FixedDateTime> {
    let naive = NaiveDate::parse_from_str(&record.date, "%Y-%m-%d")?;
    Ok(Utc
        .from_utc_datetime(&naive.and_time(NaiveTime::MIN))
        .fixed_offset())
}

fn newest_date(records: &[Record]) -> Result<FixedDateTime> {
    match records.first() {
        Some(record) => record_date(record),
        None => Ok(Utc
            .from_utc_datetime(&NaiveDate::default().and_time(NaiveTime::MIN))
            .fixed_offset()),
    }
}

fn author_to_people(author: Option<Author>) -> Vec<Person> {
    match author {
        Some(author) => {
            let mut person = Person::default();
            person.set_name(author.name);
            person.set_email(author.email);
            vec![person]
        }
        None => Vec::new(),
    }
}

/// The result of a fallible feed operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem creating a feed. Variants include I/O, Atom, and
/// date parsing issues.
#[derive(Debug)]
pub enum Error {
    /// Returned when there is a generic I/O error.
    Io(std::io::Error),

    /// Returned when there is an Atom-related error.
    Atom(AtomError),

    /// Returned when a record's date fails to parse. Dates are written by
    /// the publish flow, so this indicates a corrupted index.
    DateTimeParse(ParseError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => err.fmt(f),
            Error::Atom(err) => err.fmt(f),
            Error::DateTimeParse(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Atom(err) => Some(err),
            Error::DateTimeParse(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for Error {
    /// Converts [`std::io::Error`]s into [`Error`]. This allows us to use
    /// the `?` operator in fallible feed operations.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<AtomError> for Error {
    /// Converts [`AtomError`]s into [`Error`]. This allows us to use the `?`
    /// operator in fallible feed operations.
    fn from(err: AtomError) -> Error {
        Error::Atom(err)
    }
}

impl From<ParseError> for Error {
    /// Converts [`ParseError`]s into [`Error`]. This allows us to use the
    /// `?` operator in fallible feed operations.
    fn from(err: ParseError) -> Error {
        Error::DateTimeParse(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(slug: &str, date: &str) -> Record {
        Record {
            slug: slug.to_owned(),
            title: format!("Title {}", slug),
            description: "Summary text.".to_owned(),
            date: date.to_owned(),
            url: format!("{}.html", slug),
            hero: String::new(),
            tag: "health".to_owned(),
        }
    }

    fn config() -> FeedConfig {
        FeedConfig {
            title: "Example Notes".to_owned(),
            id: "https://example.org/site/".to_owned(),
            author: None,
            home_page: "https://example.org/site/index.html".to_owned(),
        }
    }

    #[test]
    fn test_feed_contains_entries() {
        let records = vec![record("b", "2026-02-02"), record("a", "2026-02-01")];
        let mut buf = Vec::new();
        write_feed(config(), &records, &mut buf).unwrap();
        let xml = String::from_utf8(buf).unwrap();
        assert!(xml.contains("<feed"));
        assert!(xml.contains("https://example.org/site/b.html"));
        assert!(xml.contains("https://example.org/site/a.html"));
        assert!(xml.contains("Title b"));
        // updated reflects the newest record, not the clock
        assert!(xml.contains("2026-02-02"));
    }

    #[test]
    fn test_feed_is_deterministic() {
        let records = vec![record("a", "2026-02-01")];
        let mut first = Vec::new();
        let mut second = Vec::new();
        write_feed(config(), &records, &mut first).unwrap();
        write_feed(config(), &records, &mut second).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_feed_rejects_corrupt_date() {
        let records = vec![record("a", "not-a-date")];
        let mut buf = Vec::new();
        assert!(matches!(
            write_feed(config(), &records, &mut buf),
            Err(Error::DateTimeParse(_))
        ));
    }

    #[test]
    fn test_empty_feed() {
        let mut buf = Vec::new();
        write_feed(config(), &[], &mut buf).unwrap();
        assert!(String::from_utf8(buf).unwrap().contains("<feed"));
    }
}
