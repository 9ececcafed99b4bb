pub mod blob;
pub mod registry;

pub use blob::{BlobStore, LocalBlobStore};
pub use registry::EvidenceRegistry;
