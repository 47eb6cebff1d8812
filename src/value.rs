//! Conversions from domain types into [`gtmpl::Value`]s for templating.
//! Every text field is HTML-escaped here, so templates can interpolate the
//! resulting values into text nodes and quoted attributes directly.

use std::collections::HashMap;

use gtmpl::Value;

use crate::post::Record;
use crate::render::escape_html;
use crate::transform::TocEntry;

impl From<&Record> for Value {
    /// Converts [`Record`]s into [`Value`]s for the home and tag-archive
    /// list templates.
    fn from(r: &Record) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("url".to_owned(), escape_html(&r.url).into());
        m.insert("title".to_owned(), escape_html(&r.title).into());
        m.insert("date".to_owned(), escape_html(&r.date).into());
        m.insert("tag".to_owned(), escape_html(&r.tag).into());
        m.insert(
            "tag_url".to_owned(),
            escape_html(&format!("tag/{}.html", r.tag)).into(),
        );
        Value::Object(m)
    }
}

impl From<&TocEntry> for Value {
    /// Converts [`TocEntry`]s into [`Value`]s for the table-of-contents
    /// block.
    fn from(entry: &TocEntry) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("text".to_owned(), escape_html(&entry.text).into());
        m.insert("id".to_owned(), escape_html(&entry.id).into());
        Value::Object(m)
    }
}
