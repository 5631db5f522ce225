//! Credential provider abstraction.

use async_trait::async_trait;

/// Source of the bearer credential used to open stream connections.
///
/// Implementations may cache or refresh tokens however they like; the
/// stream client asks once per connection attempt and never stores the
/// result.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Authorization value in the form `"Bearer <token>"`, if one is available.
    async fn authorization(&self) -> Option<String>;
}

/// Provider that always returns the same token.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    token: String,
}

impl StaticCredentials {
    /// Create a provider for a raw token (without the `Bearer` prefix).
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn authorization(&self) -> Option<String> {
        if self.token.is_empty() {
            return None;
        }
        Some(format!("Bearer {}", self.token))
    }
}

/// Extract the token from a `"Bearer <token>"` authorization value.
///
/// The scheme is matched case-insensitively. Returns `None` for any other
/// scheme or an empty token.
#[must_use]
pub fn bearer_token(authorization: &str) -> Option<&str> {
    let (scheme, token) = authorization.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
