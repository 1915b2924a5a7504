//! Disposable read-model storage and paging.

pub mod paging;
pub mod store;

pub use paging::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, Page, PageRequest};
pub use store::{InMemoryReadStore, ReadStore};
