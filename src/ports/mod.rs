pub mod artwork;
pub mod loudness;
pub mod lyrics;
pub mod metadata_source;
pub mod prompt;
pub mod provider;
pub mod tags;
