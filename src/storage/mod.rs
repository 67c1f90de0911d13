//! Storage abstraction layer for kwrank.
//!
//! The search core consumes an ordered key-value store through the
//! [`Store`] and [`Bucket`] traits. [`MemoryStore`] is the bundled
//! implementation used by tests, benches and the CLI; production callers
//! plug in their own engine.

pub mod buckets;
pub mod memory;
pub mod row_reader;
pub mod traits;

// Re-export commonly used types
pub use buckets::*;
pub use memory::*;
pub use row_reader::*;
pub use traits::*;
