pub mod config;
pub mod crawler;
pub mod error;
pub mod memory_store;
pub mod models;
pub mod postgres;
pub mod store;

pub use config::{AiBackend, Config, HackerNewsConfig, SummaryConfig};
pub use crawler::Crawler;
pub use error::{CrawlerError, CrawlerResult};
pub use memory_store::MemoryStore;
pub use models::{AuthorRecord, CommentRecord, StoryRecord, SummaryJob};
pub use postgres::PgStore;
pub use store::Store;
