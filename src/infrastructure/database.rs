// Entity Store Interface - document collections with insert, point lookup,
// filtered/ordered scans, patch and delete

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::Timestamp;
use crate::error::AppResult;

pub type DocumentId = i64;

/// Top-level JSON fields of a document
pub type Fields = Map<String, Value>;

/// A stored document: system fields plus schema-specific data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub collection: String,
    pub creation_time: Timestamp,
    pub data: Fields,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    Asc,
    /// Newest first
    #[default]
    Desc,
}

/// Scan over one collection with equality filters on top-level fields
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentQuery {
    pub collection: String,
    pub filters: Vec<(String, Value)>,
    pub order: Order,
    pub limit: Option<u32>,
}

impl DocumentQuery {
    pub fn new(collection: &str) -> Self {
        Self {
            collection: collection.to_string(),
            filters: Vec::new(),
            order: Order::Desc,
            limit: None,
        }
    }

    pub fn filter_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push((field.to_string(), value.into()));
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Document database abstraction. Each call is a single atomic operation;
/// the store provides per-operation isolation, callers add no locking.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn insert(&self, collection: &str, data: Fields) -> AppResult<Document>;

    /// Point lookup; an id from another collection is treated as absent
    async fn get(&self, collection: &str, id: DocumentId) -> AppResult<Option<Document>>;

    async fn scan(&self, query: DocumentQuery) -> AppResult<Vec<Document>>;

    async fn count(&self, query: DocumentQuery) -> AppResult<u64>;

    /// Shallow merge of `fields` into the document. False when absent.
    async fn patch(&self, collection: &str, id: DocumentId, fields: Fields) -> AppResult<bool>;

    /// False when absent
    async fn delete(&self, collection: &str, id: DocumentId) -> AppResult<bool>;

    async fn health_check(&self) -> AppResult<()> {
        Ok(())
    }
}
