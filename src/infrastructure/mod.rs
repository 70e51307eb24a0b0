// Infrastructure: storage, identity and request plumbing behind the services
pub mod blob_store;      // Blob storage for uploaded images
pub mod database;        // Entity store interface
pub mod id_generator;    // Snowflake ids and creation clock
pub mod middleware;      // ViewerContext middleware and extractor
pub mod security;        // Auth provider and sessions
pub mod sqlite_database; // SQLite entity store
pub mod viewer;          // Viewer context and session resolution

pub use blob_store::{BlobContent, BlobStore, LocalBlobStore};
pub use database::{Document, DocumentQuery, EntityStore, Fields, Order};
pub use id_generator::{IdGenerator, MonotonicClock};
pub use security::{AuthProvider, SessionService};
pub use sqlite_database::SqliteEntityStore;
pub use viewer::{ProviderSessionResolver, SessionResolver, ViewerContext};
