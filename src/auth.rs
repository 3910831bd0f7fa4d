//! Bearer-token providers for the analytics API.

use crate::error_handling::BackupError;

/// Supplies the bearer token attached to every analytics request.
///
/// The token is treated as opaque: obtaining and refreshing it is the
/// provider's concern.
pub trait TokenProvider: Send + Sync {
    /// Returns the current bearer token.
    fn bearer_token(&self) -> Result<String, BackupError>;
}

/// A fixed token, typically read from configuration or the environment.
#[derive(Clone)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    /// Wraps a token; `None` or blank makes every request fail with `Auth`.
    pub fn new(token: Option<String>) -> Self {
        Self(token.filter(|t| !t.trim().is_empty()))
    }

    /// Returns true if a token is present.
    pub fn is_configured(&self) -> bool {
        self.0.is_some()
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shown = if self.0.is_some() { "<redacted>" } else { "<none>" };
        f.debug_tuple("StaticToken").field(&shown).finish()
    }
}

impl TokenProvider for StaticToken {
    fn bearer_token(&self) -> Result<String, BackupError> {
        self.0.clone().ok_or_else(|| {
            BackupError::Auth(
                "no access token configured (set SEARCH_BACKUP_TOKEN or pass --token)".to_string(),
            )
        })
    }
}
