// Entity implementations for the blog collections and user accounts

pub mod ent_account;
pub mod ent_comment;
pub mod ent_post;

pub use crate::framework::Entity;
pub use crate::models::{Account, Comment, Post};
