//! Syndication feeds of the most recent posts.
//!
//! One [`Feed`] model is built per run and rendered into each configured
//! format:
//!
//! | Format | File        | Writer                     |
//! |--------|-------------|----------------------------|
//! | rss    | `rss.xml`   | `rss` channel builder      |
//! | atom   | `atom.xml`  | `quick-xml` event writer   |
//! | json   | `feed.json` | JSON Feed 1.1 via serde    |

use super::excerpt::excerpt_html;
use crate::{
    config::{FeedFormat, SiteConfig},
    content::{EntityKind, Loaded, MediaHint, Post},
    log,
    media::{MediaItem, list_all_media, parse_media_file_names},
    output::OutputHandler,
    utils::date::{NOON, fmt_date, fmt_time, timestamp},
};
use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::{
    Writer,
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};
use rss::{ChannelBuilder, GuidBuilder, ItemBuilder, validation::Validate};
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::{io::Cursor, path::Path};

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";
const JSON_FEED_VERSION: &str = "https://jsonfeed.org/version/1.1";

type XmlWriter = Writer<Cursor<Vec<u8>>>;

// ============================================================================
// Public API
// ============================================================================

/// Write every configured feed format. Returns the number of files written.
pub fn write_feeds(posts: &[Loaded<Post>], config: &SiteConfig, output: &dyn OutputHandler) -> Result<usize> {
    let Some(feed) = Feed::build(posts, config)? else {
        return Ok(0);
    };

    let mut written = 0;
    for &format in &config.build.generate_feeds {
        let text = feed
            .render(format)
            .with_context(|| format!("failed to generate the {format} feed"))?;
        if output.write(Path::new(format.file_name()), text.as_bytes())? {
            log!("feed"; "{}", format.file_name());
            written += 1;
        }
    }
    Ok(written)
}

// ============================================================================
// Feed Model
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Feed {
    pub title: String,
    pub link: String,
    pub description: String,
    /// Oldest post
    pub created: DateTime<Utc>,
    /// Newest post
    pub updated: DateTime<Utc>,
    pub items: Vec<FeedItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem {
    pub title: String,
    /// Also the item id.
    pub link: String,
    pub content: String,
    pub created: DateTime<Utc>,
}

impl Feed {
    /// Feed of `posts` (newest first), or `None` without posts.
    pub fn build(posts: &[Loaded<Post>], config: &SiteConfig) -> Result<Option<Self>> {
        let (Some(newest), Some(oldest)) = (posts.first(), posts.last()) else {
            return Ok(None);
        };

        let site = &config.site;
        let base_url = site.base_url();
        let title = first_non_empty(&[site.name.as_str(), base_url]);
        let description = first_non_empty(&[site.description.as_str(), site.name.as_str(), base_url]);

        let build = &config.build;
        let items = posts
            .iter()
            .take(build.feed_post_count)
            .map(|post| FeedItem::build(post, config))
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(Self {
            title,
            link: base_url.to_owned(),
            description,
            created: post_timestamp(oldest)?,
            updated: post_timestamp(newest)?,
            items,
        }))
    }

    pub fn render(&self, format: FeedFormat) -> Result<String> {
        match format {
            FeedFormat::Rss => self.to_rss(),
            FeedFormat::Atom => self.to_atom(),
            FeedFormat::Json => self.to_json(),
        }
    }

    fn to_rss(&self) -> Result<String> {
        let items: Vec<rss::Item> = self
            .items
            .iter()
            .map(|item| {
                ItemBuilder::default()
                    .title(item.title.clone())
                    .link(item.link.clone())
                    .guid(GuidBuilder::default().permalink(true).value(item.link.clone()).build())
                    .description(item.content.clone())
                    .pub_date(item.created.to_rfc2822())
                    .build()
            })
            .collect();

        let channel = ChannelBuilder::default()
            .title(&self.title)
            .link(&self.link)
            .description(&self.description)
            .pub_date(self.created.to_rfc2822())
            .last_build_date(self.updated.to_rfc2822())
            .items(items)
            .build();

        channel
            .validate()
            .map_err(|err| anyhow!("rss validation failed: {err}"))?;
        Ok(channel.to_string())
    }

    fn to_atom(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut feed = BytesStart::new("feed");
        feed.push_attribute(("xmlns", ATOM_NS));
        writer.write_event(Event::Start(feed))?;

        write_text_element(&mut writer, "title", &self.title)?;
        write_text_element(&mut writer, "id", &self.link)?;
        write_text_element(&mut writer, "updated", &rfc3339(self.updated))?;
        write_text_element(&mut writer, "subtitle", &self.description)?;
        write_link(&mut writer, &self.link)?;

        for item in &self.items {
            writer.write_event(Event::Start(BytesStart::new("entry")))?;
            write_text_element(&mut writer, "title", &item.title)?;
            write_text_element(&mut writer, "updated", &rfc3339(item.created))?;
            write_text_element(&mut writer, "id", &item.link)?;
            write_link(&mut writer, &item.link)?;

            let mut content = BytesStart::new("content");
            content.push_attribute(("type", "html"));
            writer.write_event(Event::Start(content))?;
            writer.write_event(Event::Text(BytesText::new(&item.content)))?;
            writer.write_event(Event::End(BytesEnd::new("content")))?;

            writer.write_event(Event::End(BytesEnd::new("entry")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("feed")))?;
        let xml = String::from_utf8(writer.into_inner().into_inner())?;
        Ok(xml)
    }

    fn to_json(&self) -> Result<String> {
        #[derive(Serialize)]
        struct JsonFeed<'a> {
            version: &'static str,
            title: &'a str,
            home_page_url: &'a str,
            description: &'a str,
            items: Vec<JsonItem<'a>>,
        }

        #[derive(Serialize)]
        struct JsonItem<'a> {
            id: &'a str,
            url: &'a str,
            title: &'a str,
            content_html: &'a str,
            date_published: String,
        }

        let feed = JsonFeed {
            version: JSON_FEED_VERSION,
            title: &self.title,
            home_page_url: &self.link,
            description: &self.description,
            items: self
                .items
                .iter()
                .map(|item| JsonItem {
                    id: &item.link,
                    url: &item.link,
                    title: &item.title,
                    content_html: &item.content,
                    date_published: rfc3339(item.created),
                })
                .collect(),
        };
        Ok(serde_json::to_string_pretty(&feed)?)
    }
}

impl FeedItem {
    fn build(post: &Post, config: &SiteConfig) -> Result<Self> {
        let Some(date) = post.date else {
            bail!("post date missing: {}", post.id);
        };

        let base_url = config.site.base_url();
        let build = &config.build;
        let mut content = excerpt_html(
            post,
            base_url,
            &build.feed_continue_text,
            build.feed_excerpt_sentences,
        );
        if let Some(uri) = first_image_uri(post, config)? {
            content = format!("<img src=\"{base_url}{uri}\" />{content}");
        }

        Ok(Self {
            title: item_title(post),
            link: format!("{base_url}{}", EntityKind::Post.uri(&post.id)),
            content,
            created: date.and_time(NOON).and_utc(),
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// `date[ time][ | title]`, falling back to `| #tag #tag` without a title.
pub fn item_title(post: &Post) -> String {
    let mut title = post.date.map(fmt_date).unwrap_or_default();
    if let Some(time) = post.time {
        title.push(' ');
        title.push_str(&fmt_time(time));
    }

    if !post.title.is_empty() {
        title.push_str(" | ");
        title.push_str(&post.title);
    } else if !post.tags.is_empty() {
        let tags: Vec<String> = post.tags.iter().map(|tag| format!("#{tag}")).collect();
        title.push_str(" | ");
        title.push_str(&tags.join(" "));
    }
    title
}

fn post_timestamp(post: &Post) -> Result<DateTime<Utc>> {
    match post.date {
        Some(date) => Ok(timestamp(date, post.time)),
        None => bail!("post date missing: {}", post.id),
    }
}

/// Site-relative URI of the image leading a post's feed item.
fn first_image_uri(post: &Post, config: &SiteConfig) -> Result<Option<String>> {
    if post.media_hint == MediaHint::None {
        return Ok(None);
    }

    let dir = config.paths().media_dir(EntityKind::Post, &post.id);
    let names = list_all_media(&dir, &FxHashSet::default())?;
    let sizes = config.build.media.sorted_thumb_sizes();
    let media = parse_media_file_names(&names, EntityKind::Post, &post.id, &dir, &sizes);

    let image = match &post.media_hint {
        MediaHint::None => None,
        MediaHint::File(name) => media.iter().find(|m| m.is_image() && m.uri.contains(name.as_str())),
        MediaHint::FirstImage => media.iter().find(|m| m.is_image()),
    };
    Ok(image.map(smallest_uri))
}

fn smallest_uri(item: &MediaItem) -> String {
    item.thumbs
        .iter()
        .min_by_key(|thumb| thumb.size)
        .map_or_else(|| item.uri.clone(), |thumb| thumb.uri.clone())
}

fn first_non_empty(candidates: &[&str]) -> String {
    candidates
        .iter()
        .find(|s| !s.is_empty())
        .copied()
        .unwrap_or_default()
        .to_owned()
}

fn rfc3339(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn write_text_element(writer: &mut XmlWriter, tag: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

fn write_link(writer: &mut XmlWriter, href: &str) -> Result<()> {
    let mut link = BytesStart::new("link");
    link.push_attribute(("href", href));
    writer.write_event(Event::Empty(link))?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
