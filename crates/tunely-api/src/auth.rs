use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use reqwest::header::HeaderValue;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::error::Error;

/// Process-wide, replaceable access token for the Tunes API.
///
/// Cheaply cloneable: every clone shares the same slot, so a call to
/// [`update_credential`](Self::update_credential) is observed by the next
/// request of every client holding a clone. Requests already on the wire
/// keep the header they were built with.
#[derive(Clone, Default)]
pub struct Credential {
    token: Arc<ArcSwapOption<SecretString>>,
}

impl Credential {
    /// Create a credential slot holding `token` (or nothing yet).
    pub fn new(token: Option<SecretString>) -> Self {
        let credential = Self::default();
        credential.update_credential(token);
        credential
    }

    /// Replace the current token. An empty string clears it.
    pub fn update_credential(&self, token: Option<SecretString>) {
        let token = token.filter(|t| !t.expose_secret().trim().is_empty());
        debug!(present = token.is_some(), "access token updated");
        self.token.store(token.map(Arc::new));
    }

    /// Whether a token is currently configured.
    pub fn is_set(&self) -> bool {
        self.token.load().is_some()
    }

    /// Build the `Authorization` header value from the current token.
    pub(crate) fn bearer_header(&self) -> Result<HeaderValue, Error> {
        let guard = self.token.load();
        let token = guard.as_ref().ok_or(Error::MissingCredential)?;
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
            .map_err(|_| Error::Unauthorized)?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("set", &self.is_set())
            .finish()
    }
}
