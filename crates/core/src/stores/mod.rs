pub mod local;
pub mod qdrant;

pub use local::LocalStore;
pub use qdrant::QdrantStore;
