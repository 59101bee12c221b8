//! Where crawled pages end up: the `PageStore` seam, its Postgres and
//! in-memory implementations, and the content sanitizer.

pub mod page_store;
pub mod postgres;
pub mod sanitizer;

pub use page_store::{MemoryStore, PageStore, SiteRecord};
pub use postgres::PostgresStore;
pub use sanitizer::{HtmlStripper, TextSanitizer};
