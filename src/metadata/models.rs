//! Data model for the track metadata being prepared for publishing.

use super::genre::Genre;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of recording, as detected from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrackType {
    #[serde(rename = "track")]
    Track,
    #[serde(rename = "live performance")]
    LivePerformance,
    #[serde(rename = "set")]
    Set,
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

impl TrackType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackType::Track => "track",
            TrackType::LivePerformance => "live performance",
            TrackType::Set => "set",
            TrackType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TrackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    #[default]
    Public,
    Private,
    Schedule,
}

impl Privacy {
    pub fn parse(raw: &str) -> Option<Privacy> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "public" => Some(Privacy::Public),
            "private" => Some(Privacy::Private),
            "schedule" => Some(Privacy::Schedule),
            _ => None,
        }
    }
}

/// Who produced the current cover image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverOrigin {
    /// Uploaded by the user. Only an explicit regeneration request may replace it.
    User,
    /// Produced by the generation pipeline.
    Generated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverImage {
    /// `data:<mime>;base64,<payload>` reference, directly displayable.
    pub data_uri: String,
    pub origin: CoverOrigin,
}

/// The authoritative metadata record owned by the sync controller.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub title: String,
    pub artist: String,
    pub genre: Option<Genre>,
    pub tags: String,
    pub description: String,
    pub cover_image: Option<CoverImage>,
    pub track_type: TrackType,
    pub privacy: Privacy,
}

impl MetadataRecord {
    /// Clear the fields the pipeline derives from the title. The cover stays.
    pub fn clear_generated_text(&mut self) {
        self.genre = None;
        self.tags.clear();
        self.description.clear();
    }

    /// Reset everything an ingested input may have populated.
    pub fn reset_derived(&mut self) {
        self.title.clear();
        self.artist.clear();
        self.clear_generated_text();
        self.track_type = TrackType::Unknown;
    }

    pub fn has_cover(&self) -> bool {
        self.cover_image.is_some()
    }

    /// Current value of the title debounce group.
    pub fn title_group(&self) -> String {
        self.title.clone()
    }

    /// Current value of the {genre, tags, description, artist} debounce group.
    pub fn details_group(&self) -> DetailsGroup {
        DetailsGroup {
            genre: self.genre,
            tags: self.tags.clone(),
            description: self.description.clone(),
            artist: self.artist.clone(),
        }
    }
}

/// Snapshot of the secondary metadata fields watched as one debounce group.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DetailsGroup {
    pub genre: Option<Genre>,
    pub tags: String,
    pub description: String,
    pub artist: String,
}

/// A field the user can edit by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataField {
    Title,
    Artist,
    Genre,
    Tags,
    Description,
    Privacy,
}

impl MetadataField {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataField::Title => "title",
            MetadataField::Artist => "artist",
            MetadataField::Genre => "genre",
            MetadataField::Tags => "tags",
            MetadataField::Description => "description",
            MetadataField::Privacy => "privacy",
        }
    }
}

/// Progress of the current operation, each counter 0–100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProgressState {
    /// Simulated upload progress, only meaningful for audio files.
    pub ingestion: u8,
    /// Generation progress, meaningful for any cycle.
    pub analysis: u8,
}

/// Analysis checkpoints reported by the pipeline.
pub mod checkpoints {
    pub const START: u8 = 0;
    pub const REQUEST_SENT: u8 = 20;
    pub const TEXT_APPLIED: u8 = 60;
    pub const IMAGE_REQUESTED: u8 = 80;
    pub const COMPLETE: u8 = 100;
}

/// Canonical starting point derived from an ingested input.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Seed {
    pub title: String,
    pub artist: Option<String>,
    pub genre: Option<Genre>,
    pub tags: Option<String>,
    pub description: Option<String>,
    pub track_type: TrackType,
}

/// Input to one generation cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub title: String,
    /// Current values, used as hints rather than ground truth.
    pub genre: Option<Genre>,
    pub tags: String,
    pub description: String,
    pub generate_image: bool,
    pub artist: Option<String>,
    pub track_type: TrackType,
}

impl GenerationRequest {
    /// Build a request from the current record.
    pub fn from_record(record: &MetadataRecord, generate_image: bool) -> Self {
        Self {
            title: record.title.clone(),
            genre: record.genre,
            tags: record.tags.clone(),
            description: record.description.clone(),
            generate_image,
            artist: (!record.artist.is_empty()).then(|| record.artist.clone()),
            track_type: record.track_type,
        }
    }
}

/// Output of one generation cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResult {
    pub genre: Option<Genre>,
    pub tags: String,
    pub description: String,
    /// Data URI of the generated cover, when an image was requested.
    pub image: Option<String>,
    /// Set when the text response needed fallback parsing.
    pub partial_parse: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_type_serde() {
        assert_eq!(
            serde_json::to_string(&TrackType::LivePerformance).unwrap(),
            "\"live performance\""
        );
        let parsed: TrackType = serde_json::from_str("\"set\"").unwrap();
        assert_eq!(parsed, TrackType::Set);
        assert_eq!(TrackType::default(), TrackType::Unknown);
    }

    #[test]
    fn test_privacy_parse() {
        assert_eq!(Privacy::parse("Private"), Some(Privacy::Private));
        assert_eq!(Privacy::parse(" schedule "), Some(Privacy::Schedule));
        assert_eq!(Privacy::parse("unlisted"), None);
    }

    #[test]
    fn test_clear_generated_text_keeps_cover() {
        let mut record = MetadataRecord {
            title: "Night Drive".to_string(),
            artist: "Someone".to_string(),
            genre: Genre::parse("Techno"),
            tags: "dark, driving".to_string(),
            description: "A late night cut.".to_string(),
            cover_image: Some(CoverImage {
                data_uri: "data:image/png;base64,AAAA".to_string(),
                origin: CoverOrigin::User,
            }),
            ..Default::default()
        };

        record.clear_generated_text();

        assert_eq!(record.genre, None);
        assert!(record.tags.is_empty());
        assert!(record.description.is_empty());
        assert_eq!(record.artist, "Someone");
        assert!(record.has_cover());
    }

    #[test]
    fn test_request_from_record() {
        let record = MetadataRecord {
            title: "Sunrise Set".to_string(),
            track_type: TrackType::Set,
            ..Default::default()
        };
        let request = GenerationRequest::from_record(&record, true);
        assert_eq!(request.title, "Sunrise Set");
        assert_eq!(request.artist, None);
        assert!(request.generate_image);
        assert_eq!(request.track_type, TrackType::Set);
    }
}
