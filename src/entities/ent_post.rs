// Post entity - rows of the `posts` collection

use serde_json::{json, Value};

use crate::core::{BlobHandle, PostId, UserId};
use crate::error::AppResult;
use crate::framework::ent_trait::{optional_str, required_parsed, required_str, Entity};
use crate::framework::Owned;
use crate::infrastructure::database::{Document, EntityStore, Fields};
use crate::models::{NewPost, Post};

pub const TITLE: &str = "title";
pub const BODY: &str = "body";
pub const AUTHOR_ID: &str = "author_id";
pub const IMAGE_STORAGE_ID: &str = "image_storage_id";

impl Entity for Post {
    const COLLECTION: &'static str = "posts";
    const NOUN: &'static str = "post";

    type Id = PostId;

    fn id(&self) -> PostId {
        self.id
    }

    fn from_document(doc: Document) -> AppResult<Self> {
        let image_storage_id = match optional_str(&doc, IMAGE_STORAGE_ID)? {
            Some(_) => Some(required_parsed(&doc, IMAGE_STORAGE_ID)?),
            None => None,
        };
        Ok(Post {
            id: PostId::new(doc.id),
            title: required_str(&doc, TITLE)?,
            body: required_str(&doc, BODY)?,
            author_id: required_parsed(&doc, AUTHOR_ID)?,
            image_storage_id,
            creation_time: doc.creation_time,
        })
    }
}

impl Owned for Post {
    fn owner_id(&self) -> UserId {
        self.author_id
    }
}

impl Post {
    /// Insert a post owned by `author`. The author id is written once here
    /// and never patched afterwards.
    pub async fn create(store: &dyn EntityStore, author: UserId, new_post: NewPost) -> AppResult<Post> {
        let mut fields = Fields::new();
        fields.insert(TITLE.to_string(), Value::String(new_post.title));
        fields.insert(BODY.to_string(), Value::String(new_post.body));
        fields.insert(AUTHOR_ID.to_string(), json!(author));
        fields.insert(IMAGE_STORAGE_ID.to_string(), json!(new_post.image_storage_id));
        Self::insert(store, fields).await
    }

    pub async fn gen_by_author(store: &dyn EntityStore, author: UserId) -> AppResult<Vec<Post>> {
        Self::gen_where(store, AUTHOR_ID, json!(author)).await
    }

    pub async fn count_by_author(store: &dyn EntityStore, author: UserId) -> AppResult<u64> {
        Self::count_where(store, AUTHOR_ID, json!(author)).await
    }

    /// Posts that still show the image behind `handle`
    pub async fn count_by_image(store: &dyn EntityStore, handle: &BlobHandle) -> AppResult<u64> {
        Self::count_where(store, IMAGE_STORAGE_ID, json!(handle)).await
    }
}
