pub mod memory;
pub mod models;
pub mod populate;
pub mod postgres;
pub mod query_builder;
pub mod repository;
pub mod store;

pub use memory::MemoryStore;
pub use postgres::PgDocumentStore;
pub use query_builder::{PreparedQuery, Projection, QueryBuilder, QueryParams};
pub use repository::Repository;
pub use store::{Document, DocumentStore, StoreError};
