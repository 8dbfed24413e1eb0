//! Input ingestors: turn a dropped audio file or a pasted link into a seed.

use super::error::SyncError;
use crate::metadata::{Seed, TrackType};
use reqwest::Url;
use std::path::Path;

/// Audio extensions stripped when deriving a title from a file name.
const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "flac", "ogg", "m4a", "aac", "aiff", "aif", "wma", "opus",
];

/// A file handed over by a picker or drop zone.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub file_name: String,
    /// Content type declared by the client; trusted for routing.
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl IncomingFile {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn is_audio(&self) -> bool {
        self.content_type
            .trim()
            .to_ascii_lowercase()
            .starts_with("audio/")
    }

    pub fn is_image(&self) -> bool {
        crate::metadata::cover::is_image_content_type(&self.content_type)
    }
}

/// Strip a known audio extension from an uploaded file name.
pub fn title_from_file_name(file_name: &str) -> String {
    let name = Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(file_name);
    match name.rsplit_once('.') {
        Some((stem, ext)) if AUDIO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) => {
            stem.trim().to_string()
        }
        _ => name.trim().to_string(),
    }
}

/// Classify a title by keyword: live/performance first, then set/mix.
pub fn classify_title(title: &str) -> TrackType {
    let lowered = title.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    if words.iter().any(|w| *w == "live" || *w == "performance") {
        TrackType::LivePerformance
    } else if words.iter().any(|w| *w == "set" || *w == "mix") {
        TrackType::Set
    } else {
        TrackType::Track
    }
}

/// Validate an audio upload and derive its seed.
pub fn seed_from_audio_file(file: &IncomingFile) -> Result<Seed, SyncError> {
    if !file.is_audio() {
        return Err(SyncError::InvalidInputKind(format!(
            "expected an audio file, got '{}'",
            file.content_type
        )));
    }

    let title = title_from_file_name(&file.file_name);
    let track_type = classify_title(&title);

    Ok(Seed {
        title,
        track_type,
        ..Default::default()
    })
}

/// Validate a pasted link: non-blank, parseable, http(s).
pub fn parse_link(link: &str) -> Result<Url, SyncError> {
    let link = link.trim();
    if link.is_empty() {
        return Err(SyncError::EmptyInput("link"));
    }

    let url = Url::parse(link)
        .map_err(|e| SyncError::LinkResolution(format!("malformed link '{}': {}", link, e)))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(SyncError::LinkResolution(format!(
            "unsupported link scheme: {}",
            url.scheme()
        )));
    }
    Ok(url)
}

/// Non-empty path segments of a track link.
pub fn path_segments(url: &Url) -> Vec<String> {
    url.path_segments()
        .map(|segments| {
            segments
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// Classify a link by its path: a `sets` segment, then live/performance
/// anywhere in the path, then any link with at least two segments.
pub fn classify_link(url: &Url) -> TrackType {
    let segments = path_segments(url);
    let path = url.path().to_lowercase();

    if segments.iter().any(|s| s.eq_ignore_ascii_case("sets")) {
        TrackType::Set
    } else if path.contains("live") || path.contains("performance") {
        TrackType::LivePerformance
    } else if segments.len() >= 2 {
        TrackType::Track
    } else {
        TrackType::Unknown
    }
}

/// Turn a slug such as `cool-house-mix` into `Cool House Mix`.
pub fn humanize_slug(slug: &str) -> String {
    slug.split(['-', '_', '+', ' '])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_seed() {
        let file = IncomingFile::new("Live at Club 2024.wav", "audio/wav", vec![0; 4]);
        let seed = seed_from_audio_file(&file).unwrap();
        assert_eq!(seed.title, "Live at Club 2024");
        assert_eq!(seed.track_type, TrackType::LivePerformance);
        assert_eq!(seed.artist, None);
    }

    #[test]
    fn test_non_audio_rejected() {
        let file = IncomingFile::new("cover.png", "image/png", vec![]);
        let err = seed_from_audio_file(&file).unwrap_err();
        assert!(matches!(err, SyncError::InvalidInputKind(_)));
    }

    #[test]
    fn test_title_from_file_name() {
        assert_eq!(title_from_file_name("Live at Club 2024.wav"), "Live at Club 2024");
        assert_eq!(title_from_file_name("set.FLAC"), "set");
        assert_eq!(title_from_file_name("/uploads/track.mp3"), "track");
        assert_eq!(title_from_file_name("notes.txt"), "notes.txt");
        assert_eq!(title_from_file_name("v1.2 final.mp3"), "v1.2 final");
    }

    #[test]
    fn test_classify_title() {
        assert_eq!(classify_title("LIVE in Berlin"), TrackType::LivePerformance);
        assert_eq!(classify_title("Rooftop Performance"), TrackType::LivePerformance);
        assert_eq!(classify_title("Sunday Mix"), TrackType::Set);
        assert_eq!(classify_title("closing set (live)"), TrackType::LivePerformance);
        assert_eq!(classify_title("Warehouse-Set-2023"), TrackType::Set);
        assert_eq!(classify_title("Sunset Boulevard"), TrackType::Track);
        assert_eq!(classify_title("Night Drive"), TrackType::Track);
    }

    #[test]
    fn test_classify_link() {
        let url = Url::parse("https://soundcloud.com/artist-name/cool-house-mix").unwrap();
        assert_eq!(classify_link(&url), TrackType::Track);

        let url = Url::parse("https://soundcloud.com/artist-name/sets/summer").unwrap();
        assert_eq!(classify_link(&url), TrackType::Set);

        let url = Url::parse("https://soundcloud.com/artist/live-at-dekmantel").unwrap();
        assert_eq!(classify_link(&url), TrackType::LivePerformance);

        let url = Url::parse("https://soundcloud.com/artist-name").unwrap();
        assert_eq!(classify_link(&url), TrackType::Unknown);
    }

    #[test]
    fn test_parse_link() {
        assert!(parse_link(" https://soundcloud.com/a/b ").is_ok());
        assert!(matches!(parse_link(""), Err(SyncError::EmptyInput("link"))));
        assert!(matches!(
            parse_link("soundcloud.com/a/b"),
            Err(SyncError::LinkResolution(_))
        ));
        assert!(matches!(
            parse_link("mailto:someone@example.com"),
            Err(SyncError::LinkResolution(_))
        ));
    }

    #[test]
    fn test_humanize_slug() {
        assert_eq!(humanize_slug("artist-name"), "Artist Name");
        assert_eq!(humanize_slug("cool_house__mix"), "Cool House Mix");
        assert_eq!(humanize_slug(""), "");
    }
}
