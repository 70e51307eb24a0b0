// Entity Trait - typed access to one collection of the entity store
// Loaders follow the genNullable / genEnforce / genAll naming

use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Display;
use std::str::FromStr;

use crate::error::{AppError, AppResult};
use crate::infrastructure::database::{Document, DocumentQuery, EntityStore, Fields};

/// Implemented by every record stored in the entity store
#[async_trait]
pub trait Entity: Sized + Send + Sync {
    /// Collection name in the store
    const COLLECTION: &'static str;
    /// Singular noun used in error messages
    const NOUN: &'static str;

    type Id: Copy + Display + From<i64> + Into<i64> + Send + Sync;

    fn id(&self) -> Self::Id;

    /// Decode a stored document, rejecting rows that do not match the schema
    fn from_document(doc: Document) -> AppResult<Self>;

    /// Load by id; `None` if absent
    async fn gen_nullable(store: &dyn EntityStore, id: Self::Id) -> AppResult<Option<Self>> {
        match store.get(Self::COLLECTION, id.into()).await? {
            Some(doc) => Ok(Some(Self::from_document(doc)?)),
            None => Ok(None),
        }
    }

    /// Load by id; `NotFound` if absent
    async fn gen_enforce(store: &dyn EntityStore, id: Self::Id) -> AppResult<Self> {
        Self::gen_nullable(store, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} {} not found", capitalize(Self::NOUN), id)))
    }

    /// Every row, newest first
    async fn gen_all(store: &dyn EntityStore) -> AppResult<Vec<Self>> {
        Self::gen_query(store, DocumentQuery::new(Self::COLLECTION)).await
    }

    /// Rows whose `field` equals `value`, newest first
    async fn gen_where(store: &dyn EntityStore, field: &str, value: Value) -> AppResult<Vec<Self>> {
        Self::gen_query(store, DocumentQuery::new(Self::COLLECTION).filter_eq(field, value)).await
    }

    async fn gen_query(store: &dyn EntityStore, query: DocumentQuery) -> AppResult<Vec<Self>> {
        store
            .scan(query)
            .await?
            .into_iter()
            .map(Self::from_document)
            .collect()
    }

    async fn count_where(store: &dyn EntityStore, field: &str, value: Value) -> AppResult<u64> {
        store
            .count(DocumentQuery::new(Self::COLLECTION).filter_eq(field, value))
            .await
    }

    async fn insert(store: &dyn EntityStore, fields: Fields) -> AppResult<Self> {
        let doc = store.insert(Self::COLLECTION, fields).await?;
        Self::from_document(doc)
    }

    /// False when the row no longer exists
    async fn delete(store: &dyn EntityStore, id: Self::Id) -> AppResult<bool> {
        store.delete(Self::COLLECTION, id.into()).await
    }
}

pub fn required_str(doc: &Document, field: &str) -> AppResult<String> {
    match doc.data.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        _ => Err(schema_error(doc, field)),
    }
}

pub fn optional_str(doc: &Document, field: &str) -> AppResult<Option<String>> {
    match doc.data.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(schema_error(doc, field)),
    }
}

/// Parse a string-typed field into an id or handle type
pub fn required_parsed<T: FromStr>(doc: &Document, field: &str) -> AppResult<T> {
    required_str(doc, field)?
        .parse()
        .map_err(|_| schema_error(doc, field))
}

fn schema_error(doc: &Document, field: &str) -> AppError {
    AppError::Internal(format!(
        "{} {} has a missing or malformed `{}` field",
        doc.collection, doc.id, field
    ))
}

fn capitalize(noun: &str) -> String {
    let mut chars = noun.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Timestamp, UserId};
    use serde_json::json;

    fn doc(data: Value) -> Document {
        Document {
            id: 9,
            collection: "posts".to_string(),
            creation_time: Timestamp(1),
            data: match data {
                Value::Object(map) => map,
                _ => unreachable!(),
            },
        }
    }

    #[test]
    fn test_field_readers() {
        let d = doc(json!({"title": "x", "author_id": "12", "image": null, "bad": 3}));
        assert_eq!(required_str(&d, "title").unwrap(), "x");
        assert_eq!(required_parsed::<UserId>(&d, "author_id").unwrap(), UserId::new(12));
        assert_eq!(optional_str(&d, "image").unwrap(), None);
        assert_eq!(optional_str(&d, "missing").unwrap(), None);
        assert!(optional_str(&d, "bad").is_err());
        assert!(required_str(&d, "missing").is_err());
        assert!(required_parsed::<UserId>(&d, "title").is_err());
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("comment"), "Comment");
        assert_eq!(capitalize(""), "");
    }
}
