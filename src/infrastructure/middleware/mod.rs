// Request middleware and extractors: builds the ViewerContext and exposes it
// to handlers, and decodes JSON bodies

pub mod json_extractor;
pub mod viewer_context_extractor;
pub mod viewer_context_middleware;

pub use json_extractor::AppJson;
pub use viewer_context_extractor::Vc;
pub use viewer_context_middleware::viewer_context_middleware;
