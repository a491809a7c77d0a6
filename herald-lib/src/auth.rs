//! Credentials for the `Authorization` header.

use secrecy::{ExposeSecret, SecretString};
use std::fmt::Debug;

use crate::{ErrorKind, Result};

/// Default prefix of the `Authorization` header value
pub const DEFAULT_TOKEN_PREFIX: &str = "Bot";

/// Yields the credential sent in the `Authorization` header
pub trait AuthProvider: Debug + Send + Sync {
    /// The full header value, e.g. `Bot <token>`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::MissingToken`] if no credential is available.
    fn authorization(&self) -> Result<String>;
}

/// A bot token and/or OAuth2 access token.
///
/// The bot token takes precedence; both share the same prefix.
#[derive(Debug, Clone)]
pub struct Token {
    prefix: String,
    token: Option<SecretString>,
    access_token: Option<SecretString>,
}

impl Token {
    /// A bot token with the default prefix
    #[must_use]
    pub fn bot(token: impl Into<String>) -> Self {
        Self::default().with_token(token)
    }

    /// No credential at all. Requests that need authorization fail.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Set the bot token
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(SecretString::from(token.into()));
        self
    }

    /// Set the access token, used when no bot token is set
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(SecretString::from(token.into()));
        self
    }

    /// Replace the header prefix
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }
}

impl Default for Token {
    fn default() -> Self {
        Self {
            prefix: String::from(DEFAULT_TOKEN_PREFIX),
            token: None,
            access_token: None,
        }
    }
}

impl AuthProvider for Token {
    fn authorization(&self) -> Result<String> {
        [&self.token, &self.access_token]
            .into_iter()
            .flatten()
            .map(ExposeSecret::expose_secret)
            .find(|token| !token.is_empty())
            .map(|token| format!("{} {token}", self.prefix))
            .ok_or(ErrorKind::MissingToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bot_token() {
        assert_eq!(Token::bot("abc").authorization().unwrap(), "Bot abc");
    }

    #[test]
    fn test_access_token_fallback() {
        let token = Token::none()
            .with_access_token("oauth")
            .with_prefix("Bearer");
        assert_eq!(token.authorization().unwrap(), "Bearer oauth");

        let token = token.with_token("bot");
        assert_eq!(token.authorization().unwrap(), "Bearer bot");
    }

    #[test]
    fn test_missing_token() {
        assert!(matches!(
            Token::none().authorization(),
            Err(ErrorKind::MissingToken)
        ));
        assert!(matches!(
            Token::bot("").authorization(),
            Err(ErrorKind::MissingToken)
        ));
    }

    #[test]
    fn test_token_is_redacted() {
        let debug = format!("{:?}", Token::bot("super-secret"));
        assert!(!debug.contains("super-secret"));
    }
}
