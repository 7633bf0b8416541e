pub mod encryption;
pub mod error;
pub mod memory;

// Re-export commonly used types
pub use encryption::Crypto;
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
