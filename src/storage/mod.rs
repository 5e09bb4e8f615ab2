mod backend;
mod bucket;
mod in_memory;

pub use backend::ObjectStore;
pub use bucket::{BucketStore, UPLOAD_TIMEOUT, classify_response, is_safe_key};
pub use in_memory::InMemoryStore;
