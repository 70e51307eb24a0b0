use uuid::Uuid;

/// Request-scoped context handed to every service call: who is asking
/// (as an unresolved session token) and a request id for log correlation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerContext {
    pub request_id: String,
    pub session_token: Option<String>,
}

impl ViewerContext {
    pub fn new(request_id: String, session_token: Option<String>) -> Self {
        ViewerContext {
            request_id,
            session_token,
        }
    }

    /// Context without credentials
    pub fn anonymous() -> Self {
        Self::new(new_request_id(), None)
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self::new(new_request_id(), Some(token.into()))
    }

    pub fn has_credentials(&self) -> bool {
        self.session_token.is_some()
    }
}

pub fn new_request_id() -> String {
    format!("req-{}", Uuid::new_v4())
}
