//! The vector-index boundary: traits for embedding and nearest-neighbor
//! search, the hosted Pinecone implementation, and an in-memory index used
//! as a deterministic test double.

pub mod memory;
pub mod openai;
pub mod pinecone;
pub mod types;

pub use memory::MemoryIndex;
pub use openai::OpenAiEmbedder;
pub use pinecone::PineconeIndex;
pub use types::{Embedder, IndexRecord, RecordHit, VectorIndex};
