// src/ingest/parsers/feed.rs
//! RSS 2.0, RSS 1.0 (RDF) and Atom → [`RawEntry`].

use std::borrow::Cow;

use metrics::histogram;
use quick_xml::de::from_str;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;

use crate::error::ParseError;
use crate::ingest::types::RawEntry;
use crate::timestamp::parse_timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFormat {
    Rss,
    Rdf,
    Atom,
}

// ---- RSS 2.0 / RDF ----

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

/// RSS 1.0 keeps its items next to the channel, not inside it.
#[derive(Debug, Deserialize)]
struct Rdf {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    published: Option<String>,
    updated: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    #[serde(rename = "dc:date", alias = "date")]
    dc_date: Option<String>,
    description: Option<String>,
    #[serde(rename = "content:encoded", alias = "encoded")]
    content_encoded: Option<String>,
}

// ---- Atom ----

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<TextNode>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    published: Option<String>,
    updated: Option<String>,
    #[serde(rename = "dc:date", alias = "date")]
    dc_date: Option<String>,
    summary: Option<TextNode>,
    content: Option<TextNode>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

/// Text element that may carry attributes (`type="html"`).
#[derive(Debug, Default, Deserialize)]
struct TextNode {
    #[serde(rename = "$text", default)]
    value: String,
}

/// Identify the feed dialect from the root element.
pub fn sniff_format(xml: &str) -> Result<FeedFormat, ParseError> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = e.local_name();
                return match name.as_ref() {
                    b"rss" => Ok(FeedFormat::Rss),
                    b"RDF" => Ok(FeedFormat::Rdf),
                    b"feed" => Ok(FeedFormat::Atom),
                    other => Err(ParseError::UnknownFeedFormat(
                        String::from_utf8_lossy(other).into_owned(),
                    )),
                };
            }
            Ok(Event::Eof) => return Err(ParseError::UnknownFeedFormat(String::new())),
            Ok(_) => continue,
            Err(e) => return Err(ParseError::Feed(e.to_string())),
        }
    }
}

/// First non-empty candidate that parses; otherwise the first non-empty one verbatim.
fn pick_published(candidates: [Option<&str>; 4]) -> Option<String> {
    let present: Vec<&str> = candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    present
        .iter()
        .find(|s| parse_timestamp(s).is_some())
        .or_else(|| present.first())
        .map(|s| s.to_string())
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl Item {
    fn into_raw(self, source_name: &str) -> RawEntry {
        let published = pick_published([
            self.published.as_deref(),
            self.updated.as_deref(),
            self.pub_date.as_deref(),
            self.dc_date.as_deref(),
        ]);
        RawEntry {
            source_name: source_name.to_string(),
            title: non_empty(self.title),
            link: non_empty(self.link),
            published,
            summary: non_empty(self.description).or_else(|| non_empty(self.content_encoded)),
        }
    }
}

impl AtomEntry {
    fn into_raw(self, source_name: &str) -> RawEntry {
        let published = pick_published([
            self.published.as_deref(),
            self.updated.as_deref(),
            None,
            self.dc_date.as_deref(),
        ]);
        // Prefer rel="alternate" (or no rel), else the first href.
        let link = self
            .links
            .iter()
            .find(|l| l.href.is_some() && matches!(l.rel.as_deref(), None | Some("alternate")))
            .or_else(|| self.links.iter().find(|l| l.href.is_some()))
            .and_then(|l| l.href.clone());
        RawEntry {
            source_name: source_name.to_string(),
            title: non_empty(self.title.map(|t| t.value)),
            link: non_empty(link),
            published,
            summary: non_empty(self.summary.map(|t| t.value))
                .or_else(|| non_empty(self.content.map(|t| t.value))),
        }
    }
}

/// Parse an RSS/RDF/Atom document into raw entries, preserving document order.
pub fn parse_feed(source_name: &str, xml: &str) -> Result<Vec<RawEntry>, ParseError> {
    let t0 = std::time::Instant::now();
    let scrubbed = scrub_html_entities_for_xml(xml.trim_start_matches('\u{feff}'));
    let clean = fold_inline_markup(&scrubbed)?;
    let de = |e: quick_xml::de::DeError| ParseError::Feed(e.to_string());

    let out: Vec<RawEntry> = match sniff_format(&clean)? {
        FeedFormat::Rss => from_str::<Rss>(&clean)
            .map_err(de)?
            .channel
            .items
            .into_iter()
            .map(|i| i.into_raw(source_name))
            .collect(),
        FeedFormat::Rdf => from_str::<Rdf>(&clean)
            .map_err(de)?
            .items
            .into_iter()
            .map(|i| i.into_raw(source_name))
            .collect(),
        FeedFormat::Atom => from_str::<AtomFeed>(&clean)
            .map_err(de)?
            .entries
            .into_iter()
            .map(|e| e.into_raw(source_name))
            .collect(),
    };

    histogram!("radar_feed_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    Ok(out)
}

/// Text-bearing elements whose content may arrive as raw (X)HTML.
const TEXT_ELEMENTS: &[&[u8]] = &[b"title", b"description", b"summary", b"content", b"encoded"];

/// Rewrites text elements that carry child markup (`<description>Oil <b>rose</b></description>`,
/// Atom `type="xhtml"` content) into a single CDATA section, so the serde pass
/// sees one text node and the normalizer gets the markup.
fn fold_inline_markup(xml: &str) -> Result<Cow<'_, str>, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().check_end_names = false;
    let mut out = String::new();
    let mut copied = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if is_text_element(e.local_name().as_ref()) => {
                let end = e.to_end().into_owned();
                let span = reader
                    .read_to_end(end.name())
                    .map_err(|err| ParseError::Feed(err.to_string()))?;
                let (start, stop) = (span.start as usize, span.end as usize);
                let inner = &xml[start..stop];
                if !has_child_markup(inner) {
                    continue;
                }
                out.push_str(&xml[copied..start]);
                out.push_str("<![CDATA[");
                out.push_str(&inner.replace("<![CDATA[", "").replace("]]>", ""));
                out.push_str("]]>");
                copied = stop;
            }
            Ok(Event::Eof) => break,
            Ok(_) => continue,
            Err(e) => return Err(ParseError::Feed(e.to_string())),
        }
    }

    if copied == 0 {
        return Ok(Cow::Borrowed(xml));
    }
    out.push_str(&xml[copied..]);
    Ok(Cow::Owned(out))
}

fn is_text_element(local: &[u8]) -> bool {
    TEXT_ELEMENTS.iter().any(|n| *n == local)
}

/// Any `<` outside CDATA sections.
fn has_child_markup(inner: &str) -> bool {
    let mut rest = inner;
    while let Some(open) = rest.find('<') {
        let tail = &rest[open..];
        if !tail.starts_with("<![CDATA[") {
            return true;
        }
        match tail.find("]]>") {
            Some(close) => rest = &tail[close + 3..],
            None => return false,
        }
    }
    false
}

/// HTML entities that feeds routinely emit without declaring them.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&laquo;", "\"")
        .replace("&raquo;", "\"")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>Markets</title>
    <item>
      <title>Brent jumps&nbsp;3%</title>
      <link>https://example.test/markets/brent</link>
      <pubDate>Mon, 03 Jun 2024 10:00:00 GMT</pubDate>
      <description><![CDATA[<p>Oil rallied.</p>]]></description>
    </item>
    <item>
      <title>Second</title>
      <link>https://example.test/markets/second</link>
      <content:encoded><![CDATA[<p>Full text</p>]]></content:encoded>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn sniffs_roots() {
        assert_eq!(sniff_format(RSS).unwrap(), FeedFormat::Rss);
        assert_eq!(
            sniff_format(r#"<feed xmlns="http://www.w3.org/2005/Atom"></feed>"#).unwrap(),
            FeedFormat::Atom
        );
        assert_eq!(
            sniff_format(r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"/>"#)
                .unwrap(),
            FeedFormat::Rdf
        );
        assert!(matches!(
            sniff_format("<html><body/></html>"),
            Err(ParseError::UnknownFeedFormat(_))
        ));
    }

    #[test]
    fn parses_rss_items_in_order() {
        let items = parse_feed("S", RSS).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title.as_deref(), Some("Brent jumps 3%"));
        assert_eq!(items[0].published.as_deref(), Some("Mon, 03 Jun 2024 10:00:00 GMT"));
        assert_eq!(items[0].summary.as_deref(), Some("<p>Oil rallied.</p>"));
        assert_eq!(items[1].published, None);
        assert_eq!(items[1].summary.as_deref(), Some("<p>Full text</p>"));
        assert!(items.iter().all(|i| i.source_name == "S"));
    }

    #[test]
    fn parses_atom_links_and_dates() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>t</title>
  <entry>
    <title type="html">Rates on hold</title>
    <link rel="self" href="https://example.test/self"/>
    <link rel="alternate" href="https://example.test/economy/rates"/>
    <updated>2024-06-03T09:00:00Z</updated>
    <summary>The central bank held rates.</summary>
  </entry>
</feed>"#;
        let items = parse_feed("A", atom).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].link.as_deref(), Some("https://example.test/economy/rates"));
        assert_eq!(items[0].published.as_deref(), Some("2024-06-03T09:00:00Z"));
        assert_eq!(items[0].title.as_deref(), Some("Rates on hold"));
    }

    #[test]
    fn unparseable_first_candidate_yields_to_parseable_one() {
        assert_eq!(
            pick_published([Some("yesterday"), None, Some("2024-06-03T09:00:00Z"), None]),
            Some("2024-06-03T09:00:00Z".to_string())
        );
        assert_eq!(
            pick_published([Some(" "), Some("soon"), None, None]),
            Some("soon".to_string())
        );
        assert_eq!(pick_published([None, None, None, None]), None);
    }

    #[test]
    fn inline_markup_in_description_keeps_every_item() {
        let rss = r#"<rss version="2.0"><channel>
  <item><title>First</title><description>Plain text body</description></item>
  <item><title>Second</title><description>Oil <b>rose</b> today, see <a href="https://x.test/1">note</a></description></item>
</channel></rss>"#;
        let items = parse_feed("S", rss).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].summary.as_deref(), Some("Plain text body"));
        assert_eq!(
            items[1].summary.as_deref(),
            Some(r#"Oil <b>rose</b> today, see <a href="https://x.test/1">note</a>"#)
        );
    }

    #[test]
    fn atom_xhtml_content_becomes_summary() {
        let atom = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <title>Body in xhtml</title>
    <link href="https://example.test/a"/>
    <content type="xhtml"><div xmlns="http://www.w3.org/1999/xhtml"><p>Body</p></div></content>
  </entry>
</feed>"#;
        let items = parse_feed("A", atom).unwrap();
        let summary = items[0].summary.as_deref().unwrap();
        assert!(summary.contains("<p>Body</p>"), "{summary}");
    }

    #[test]
    fn cdata_only_text_is_left_alone() {
        assert!(!has_child_markup("<![CDATA[<p>x</p>]]>"));
        assert!(has_child_markup("a <b>b</b>"));
        assert!(matches!(fold_inline_markup(RSS).unwrap(), Cow::Borrowed(_)));
    }

    #[test]
    fn malformed_xml_is_a_parse_error() {
        assert!(parse_feed("S", "<rss><channel><item><title>x</channel>").is_err());
    }
}
