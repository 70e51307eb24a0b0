// Services - the operations exposed to the presentation layer. Every call
// takes the request's ViewerContext and authorizes through the
// SessionResolver.

pub mod account_service;
pub mod comment_service;
pub mod post_service;

pub use account_service::AccountService;
pub use comment_service::CommentService;
pub use post_service::PostService;
