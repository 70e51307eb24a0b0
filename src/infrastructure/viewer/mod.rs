pub mod session_resolver;
pub mod viewer;

pub use session_resolver::{ProviderSessionResolver, SessionResolver};
pub use viewer::ViewerContext;
