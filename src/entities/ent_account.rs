// Account entity - rows of the `accounts` collection, owned by the auth
// provider. The document id is the user id.

use serde_json::{json, Value};

use crate::core::UserId;
use crate::error::AppResult;
use crate::framework::ent_trait::{optional_str, required_str, Entity};
use crate::infrastructure::database::{Document, DocumentQuery, EntityStore, Fields};
use crate::models::Account;

pub const NAME: &str = "name";
pub const EMAIL: &str = "email";
pub const IMAGE: &str = "image";
pub const PASSWORD_HASH: &str = "password_hash";

impl Entity for Account {
    const COLLECTION: &'static str = "accounts";
    const NOUN: &'static str = "user";

    type Id = UserId;

    fn id(&self) -> UserId {
        self.id
    }

    fn from_document(doc: Document) -> AppResult<Self> {
        Ok(Account {
            id: UserId::new(doc.id),
            name: required_str(&doc, NAME)?,
            email: required_str(&doc, EMAIL)?,
            image: optional_str(&doc, IMAGE)?,
            password_hash: required_str(&doc, PASSWORD_HASH)?,
            creation_time: doc.creation_time,
        })
    }
}

impl Account {
    /// `email` must already be normalized
    pub async fn create(
        store: &dyn EntityStore,
        name: String,
        email: String,
        password_hash: String,
    ) -> AppResult<Account> {
        let mut fields = Fields::new();
        fields.insert(NAME.to_string(), Value::String(name));
        fields.insert(EMAIL.to_string(), Value::String(email));
        fields.insert(IMAGE.to_string(), Value::Null);
        fields.insert(PASSWORD_HASH.to_string(), Value::String(password_hash));
        Self::insert(store, fields).await
    }

    pub async fn gen_by_email(store: &dyn EntityStore, email: &str) -> AppResult<Option<Account>> {
        let query = DocumentQuery::new(Self::COLLECTION)
            .filter_eq(EMAIL, json!(email))
            .limit(1);
        Ok(Self::gen_query(store, query).await?.into_iter().next())
    }

    /// False when the account no longer exists
    pub async fn set_name(store: &dyn EntityStore, id: UserId, name: String) -> AppResult<bool> {
        let mut fields = Fields::new();
        fields.insert(NAME.to_string(), Value::String(name));
        store.patch(Self::COLLECTION, id.into(), fields).await
    }

    /// False when the account no longer exists
    pub async fn set_password_hash(
        store: &dyn EntityStore,
        id: UserId,
        password_hash: String,
    ) -> AppResult<bool> {
        let mut fields = Fields::new();
        fields.insert(PASSWORD_HASH.to_string(), Value::String(password_hash));
        store.patch(Self::COLLECTION, id.into(), fields).await
    }
}
