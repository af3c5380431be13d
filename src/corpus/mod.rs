pub mod chunking;
pub mod index;
pub mod sqlite;
pub mod store;

pub use chunking::{Chunker, SourceDocument};
pub use index::CorpusIndex;
pub use sqlite::SqliteChunkStore;
pub use store::{Chunk, ChunkStorage, RetrievalResult, ScoredChunk, SourceAttribution};
