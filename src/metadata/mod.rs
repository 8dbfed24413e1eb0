//! Track metadata model, genre vocabulary and cover image helpers.

pub mod cover;
mod genre;
mod models;

pub use genre::{genre_schema, is_known_genre, Genre, GENRES};
pub use models::{
    checkpoints, CoverImage, CoverOrigin, DetailsGroup, GenerationRequest, GenerationResult,
    MetadataField, MetadataRecord, Privacy, ProgressState, Seed, TrackType,
};
