use std::fmt;

use async_trait::async_trait;

/// Supplies the bearer token attached to every exercise request.
///
/// Token refresh belongs to whoever owns the login session; the exercise client only asks
/// for the current value right before each request, so tests and embedders can pass
/// any implementation instead of a process-wide auth store.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn bearer_token(&self) -> Option<String>;
}

#[derive(Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: Option<String>) -> Self {
        Self(token.filter(|value| !value.trim().is_empty()))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn bearer_token(&self) -> Option<String> {
        self.0.clone()
    }
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StaticToken").field(&self.0.as_ref().map(|_| "<redacted>")).finish()
    }
}
