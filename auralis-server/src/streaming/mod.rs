pub mod cache;
pub mod cache_worker;
pub mod catalog;
pub mod chunk_processor;
pub mod controller;
pub mod protocol;

pub use cache::ChunkCache;
pub use catalog::{FileTrackCatalog, TrackCatalog, TrackInfo};
pub use chunk_processor::StreamChunkProcessor;
pub use controller::StreamController;
