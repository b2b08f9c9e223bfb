pub mod client;
pub mod types;
pub mod uri;

pub use client::SpotifyClient;
