//! The closed genre vocabulary accepted for published tracks.
//!
//! Generation responses are free to return anything in their `genre` field;
//! only values that resolve to an entry of [`GENRES`] are ever stored.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Music genres followed by spoken-word categories.
pub const GENRES: &[&str] = &[
    "Alternative Rock",
    "Ambient",
    "Classical",
    "Country",
    "Dance & EDM",
    "Dancehall",
    "Deep House",
    "Disco",
    "Drum & Bass",
    "Dubstep",
    "Electronic",
    "Folk & Singer-Songwriter",
    "Hip-hop & Rap",
    "House",
    "Indie",
    "Jazz & Blues",
    "Latin",
    "Metal",
    "Piano",
    "Pop",
    "R&B & Soul",
    "Reggae",
    "Reggaeton",
    "Rock",
    "Soundtrack",
    "Techno",
    "Trance",
    "Trap",
    "Triphop",
    "World",
    "Audiobooks",
    "Business",
    "Comedy",
    "Entertainment",
    "Learning",
    "News & Politics",
    "Religion & Spirituality",
    "Science",
    "Sports",
    "Storytelling",
    "Technology",
];

/// A genre known to be a member of [`GENRES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Genre(&'static str);

impl Genre {
    /// Resolve a raw string to its canonical vocabulary entry.
    ///
    /// Matching ignores ASCII case and surrounding whitespace.
    pub fn parse(raw: &str) -> Option<Genre> {
        let raw = raw.trim();
        GENRES
            .iter()
            .find(|g| g.eq_ignore_ascii_case(raw))
            .map(|g| Genre(*g))
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }

    pub fn all() -> impl Iterator<Item = Genre> {
        GENRES.iter().map(|g| Genre(*g))
    }
}

pub fn is_known_genre(raw: &str) -> bool {
    Genre::parse(raw).is_some()
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl Serialize for Genre {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0)
    }
}

impl<'de> Deserialize<'de> for Genre {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Genre::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown genre: {}", raw)))
    }
}

/// JSON schema fragment constraining a string to the vocabulary.
pub fn genre_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "string",
        "enum": GENRES,
    })
}
