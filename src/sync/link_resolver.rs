//! Track link resolution.
//!
//! Real link resolution is out of scope; [`SimulatedLinkResolver`] derives a
//! plausible seed from the URL itself after an artificial delay.

use super::error::SyncError;
use super::ingest::{classify_link, humanize_slug, parse_link, path_segments};
use crate::metadata::{Genre, Seed, TrackType};
use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;
use tracing::debug;

/// Resolves a pasted track link into a seed.
#[async_trait]
pub trait LinkResolver: Send + Sync {
    async fn resolve(&self, link: &str) -> Result<Seed, SyncError>;
}

/// Keyword → genre hints, checked in order so that more specific slugs win.
const GENRE_HINTS: &[(&str, &str)] = &[
    ("deep-house", "Deep House"),
    ("house", "House"),
    ("techno", "Techno"),
    ("trance", "Trance"),
    ("drum-and-bass", "Drum & Bass"),
    ("dnb", "Drum & Bass"),
    ("dubstep", "Dubstep"),
    ("ambient", "Ambient"),
    ("disco", "Disco"),
    ("trap", "Trap"),
    ("hip-hop", "Hip-hop & Rap"),
    ("rap", "Hip-hop & Rap"),
    ("jazz", "Jazz & Blues"),
    ("piano", "Piano"),
    ("podcast", "Entertainment"),
];

const FALLBACK_GENRE: &str = "Electronic";

pub struct SimulatedLinkResolver {
    delay: Duration,
}

impl SimulatedLinkResolver {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    fn seed_for(url: &Url) -> Result<Seed, SyncError> {
        let host = url
            .host_str()
            .ok_or_else(|| SyncError::LinkResolution(format!("link has no host: {}", url)))?;
        let segments = path_segments(url);
        let last = segments.last().ok_or_else(|| {
            SyncError::LinkResolution(format!("link does not point to a track: {}", url))
        })?;

        let title = humanize_slug(last);
        let artist = if segments.len() >= 2 {
            humanize_slug(&segments[0])
        } else {
            String::new()
        };
        let track_type = classify_link(url);

        let slug = segments.join("-").to_lowercase();
        let genre = GENRE_HINTS
            .iter()
            .find(|(keyword, _)| slug.contains(keyword))
            .map(|(_, genre)| *genre)
            .unwrap_or(FALLBACK_GENRE);
        let genre = Genre::parse(genre);

        let source = host.trim_start_matches("www.").split('.').next().unwrap_or(host);
        let mut tags = vec![];
        if let Some(genre) = genre {
            tags.push(genre.as_str().to_lowercase());
        }
        if track_type != TrackType::Unknown {
            tags.push(track_type.as_str().to_string());
        }
        tags.push(source.to_string());

        let description = if artist.is_empty() {
            format!("{}, shared from {}.", title, source)
        } else {
            format!("{} by {}, shared from {}.", title, artist, source)
        };

        Ok(Seed {
            title,
            artist: (!artist.is_empty()).then_some(artist),
            genre,
            tags: Some(tags.join(", ")),
            description: Some(description),
            track_type,
        })
    }
}

#[async_trait]
impl LinkResolver for SimulatedLinkResolver {
    async fn resolve(&self, link: &str) -> Result<Seed, SyncError> {
        let url = parse_link(link)?;
        debug!(link = %url, delay_ms = self.delay.as_millis() as u64, "Simulating link analysis");
        tokio::time::sleep(self.delay).await;

        Self::seed_for(&url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> SimulatedLinkResolver {
        SimulatedLinkResolver::new(Duration::from_millis(10))
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolves_soundcloud_track() {
        let seed = resolver()
            .resolve("https://soundcloud.com/artist-name/cool-house-mix")
            .await
            .unwrap();
        assert_eq!(seed.artist.as_deref(), Some("Artist Name"));
        assert_eq!(seed.title, "Cool House Mix");
        assert_eq!(seed.genre.map(|g| g.as_str()), Some("House"));
        assert_eq!(seed.track_type, TrackType::Track);
        assert_eq!(seed.tags.as_deref(), Some("house, track, soundcloud"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolves_set() {
        let seed = resolver()
            .resolve("https://soundcloud.com/dj-someone/sets/deep-house-sunday")
            .await
            .unwrap();
        assert_eq!(seed.track_type, TrackType::Set);
        assert_eq!(seed.title, "Deep House Sunday");
        assert_eq!(seed.genre.map(|g| g.as_str()), Some("Deep House"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_segment_link() {
        let seed = resolver()
            .resolve("https://soundcloud.com/some-artist")
            .await
            .unwrap();
        assert_eq!(seed.track_type, TrackType::Unknown);
        assert_eq!(seed.artist, None);
        assert_eq!(seed.genre.map(|g| g.as_str()), Some("Electronic"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_links() {
        let err = resolver().resolve("not a url").await.unwrap_err();
        assert!(matches!(err, SyncError::LinkResolution(_)));

        let err = resolver().resolve("ftp://example.com/a/b").await.unwrap_err();
        assert!(matches!(err, SyncError::LinkResolution(_)));

        let err = resolver().resolve("https://soundcloud.com/").await.unwrap_err();
        assert!(matches!(err, SyncError::LinkResolution(_)));

        let err = resolver().resolve("   ").await.unwrap_err();
        assert!(matches!(err, SyncError::EmptyInput("link")));
    }
}
