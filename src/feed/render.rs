//! RSS 2.0 rendering with iTunes, Google Play and Dublin Core extensions.
//!
//! Free text (titles, descriptions, artist tags) goes into CDATA sections;
//! URLs and other values go through XML escaping. Either way arbitrary file
//! names and tag values cannot break the document structure.
use chrono::{DateTime, Utc};

use super::episode::Episode;
use crate::config::Podcast;
use crate::util::{cdata, escape, join_base};

/// Value of the channel's `<generator>` element.
pub const GENERATOR: &str = "podserve";

/// Formats a timestamp in the RFC 2822 style podcast clients expect.
///
/// Always rendered in UTC with a literal `+0000` offset, independent of
/// the host's local timezone.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use podserve::feed::rfc2822;
///
/// let t = Utc.with_ymd_and_hms(2006, 1, 2, 15, 4, 5).unwrap();
/// assert_eq!(rfc2822(t), "Mon, 02 Jan 2006 15:04:05 +0000");
/// ```
pub fn rfc2822(t: DateTime<Utc>) -> String {
    t.format("%a, %d %b %Y %H:%M:%S +0000").to_string()
}

/// Renders one `<item>` element.
pub fn render_item(episode: &Episode, podcast: &Podcast) -> String {
    let url = escape(&episode.url);
    let artist = cdata(&episode.artist);

    format!(
        r#"
    <item>
      <title>{title}</title>
      <description>{artist}</description>
      <link>{url}</link>
      <guid isPermaLink="false">{url}</guid>
      <dc:creator>{creator}</dc:creator>
      <enclosure url="{url}" length="{size}" type="audio/mpeg"/>
      <itunes:author>{author}</itunes:author>
      <itunes:duration>{duration}</itunes:duration>
      <itunes:summary>{artist}</itunes:summary>
      <itunes:explicit>false</itunes:explicit>
      <pubDate>{published}</pubDate>
    </item>"#,
        title = cdata(&episode.title),
        creator = cdata(&podcast.episode_author),
        size = episode.size,
        author = escape(&podcast.episode_author),
        duration = escape(&episode.duration),
        published = rfc2822(episode.published),
    )
}

/// Renders a complete feed document.
///
/// Items appear in the order given. With no episodes the result is still a
/// complete channel, just without `<item>` elements.
pub fn render_feed(podcast: &Podcast, episodes: &[Episode], built_at: DateTime<Utc>) -> String {
    let feed_url = escape(&join_base(&podcast.base_url, "rss.xml"));
    let image = escape(&podcast.image);

    let items: String = episodes
        .iter()
        .map(|episode| render_item(episode, podcast))
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"
  xmlns:dc="http://purl.org/dc/elements/1.1/"
  xmlns:content="http://purl.org/rss/1.0/modules/content/"
  xmlns:atom="http://www.w3.org/2005/Atom"
  xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd"
  xmlns:podcast="https://podcastindex.org/namespace/1.0"
  xmlns:googleplay="http://www.google.com/schemas/play-podcasts/1.0">
  <channel>
    <title>{title}</title>
    <description>{description}</description>
    <link>{feed_url}</link>
    <itunes:image href="{image}"/>
    <image>
      <url>{image}</url>
      <title>{plain_title}</title>
      <link>{feed_url}</link>
    </image>
    <generator>{generator}</generator>
    <lastBuildDate>{built}</lastBuildDate>
    <atom:link href="{feed_url}" rel="self" type="application/rss+xml"/>
    <language>{language}</language>
    <itunes:author>{author}</itunes:author>
    <itunes:summary>{summary}</itunes:summary>
    <itunes:type>episodic</itunes:type>
    <itunes:explicit>false</itunes:explicit>
    <itunes:block>yes</itunes:block>
    <itunes:owner>
      <itunes:name>{author}</itunes:name>
      <itunes:email>{email}</itunes:email>
    </itunes:owner>
    <googleplay:block>yes</googleplay:block>{items}
  </channel>
</rss>
"#,
        title = cdata(&podcast.title),
        description = cdata(&podcast.description),
        plain_title = escape(&podcast.title),
        generator = GENERATOR,
        built = rfc2822(built_at),
        language = escape(&podcast.language),
        author = escape(&podcast.author),
        summary = cdata(&podcast.summary),
        email = escape(&podcast.email),
    )
}
