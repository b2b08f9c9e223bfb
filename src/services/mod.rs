pub mod junk;
pub mod lyrics;
pub mod metadata_cache;
pub mod pipeline;
pub mod planner;
pub mod playlist_export;
pub mod pool;
pub mod provider_chain;
pub mod rename_index;
pub mod report;
pub mod sources;
pub mod sync;
