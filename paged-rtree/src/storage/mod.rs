//! Page-oriented persistence: a validated, memory-mapped array of fixed-size
//! records addressed by page id.

pub mod page_store;
pub mod store_header;

pub use page_store::PageStore;
pub use store_header::{mix_magic, StoreHeader, FORMAT_VERSION, STORE_HEADER_SIZE};

/// Index of a record in a [`PageStore`].
pub type PageId = u32;
