use courtside_common::UserId;

/// Who is looking at the network. Passed into every query and mutation so no
/// call ever reads identity from ambient state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewerContext {
    pub user_id: UserId,
    token: Option<String>,
}

impl ViewerContext {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id, token: None }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}
