// Comment entity - rows of the `comments` collection

use serde_json::{json, Value};

use crate::core::{CommentId, PostId, UserId};
use crate::error::AppResult;
use crate::framework::ent_trait::{required_parsed, required_str, Entity};
use crate::framework::Owned;
use crate::infrastructure::database::{Document, EntityStore, Fields};
use crate::models::{Comment, Principal};

pub const POST_ID: &str = "post_id";
pub const BODY: &str = "body";
pub const AUTHOR_ID: &str = "author_id";
pub const AUTHOR_NAME: &str = "author_name";

impl Entity for Comment {
    const COLLECTION: &'static str = "comments";
    const NOUN: &'static str = "comment";

    type Id = CommentId;

    fn id(&self) -> CommentId {
        self.id
    }

    fn from_document(doc: Document) -> AppResult<Self> {
        Ok(Comment {
            id: CommentId::new(doc.id),
            post_id: required_parsed(&doc, POST_ID)?,
            body: required_str(&doc, BODY)?,
            author_id: required_parsed(&doc, AUTHOR_ID)?,
            author_name: required_str(&doc, AUTHOR_NAME)?,
            creation_time: doc.creation_time,
        })
    }
}

impl Owned for Comment {
    fn owner_id(&self) -> UserId {
        self.author_id
    }
}

impl Comment {
    /// Insert a comment by `author`, snapshotting the author's current name
    pub async fn create(
        store: &dyn EntityStore,
        post_id: PostId,
        author: &Principal,
        body: String,
    ) -> AppResult<Comment> {
        let mut fields = Fields::new();
        fields.insert(POST_ID.to_string(), json!(post_id));
        fields.insert(BODY.to_string(), Value::String(body));
        fields.insert(AUTHOR_ID.to_string(), json!(author.id));
        fields.insert(AUTHOR_NAME.to_string(), Value::String(author.name.clone()));
        Self::insert(store, fields).await
    }

    /// Replace the body only; author, post and creation time stay as they were.
    /// False when the comment no longer exists.
    pub async fn set_body(store: &dyn EntityStore, id: CommentId, body: String) -> AppResult<bool> {
        let mut fields = Fields::new();
        fields.insert(BODY.to_string(), Value::String(body));
        store.patch(Self::COLLECTION, id.into(), fields).await
    }

    pub async fn gen_by_post(store: &dyn EntityStore, post_id: PostId) -> AppResult<Vec<Comment>> {
        Self::gen_where(store, POST_ID, json!(post_id)).await
    }

    pub async fn gen_by_author(store: &dyn EntityStore, author: UserId) -> AppResult<Vec<Comment>> {
        Self::gen_where(store, AUTHOR_ID, json!(author)).await
    }
}
