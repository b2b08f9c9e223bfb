//! HTTP lyrics sources, tried in the order they are registered.

pub mod lrclib;
pub mod lyrics_ovh;

pub use lrclib::Lrclib;
pub use lyrics_ovh::LyricsOvh;
