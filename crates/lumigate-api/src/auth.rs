use secrecy::{ExposeSecret, SecretString};
use reqwest::header::HeaderValue;

use crate::error::Error;

/// Header carrying the capability token on every authenticated request.
pub const APPLICATION_KEY_HEADER: &str = "hue-application-key";

/// Credentials issued by the bridge at pairing time.
///
/// `token` authorizes every authenticated call. `client_key` is the
/// optional secondary key used for low-latency streaming.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub token: SecretString,
    pub client_key: Option<SecretString>,
}

impl Credentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::from(token.into()),
            client_key: None,
        }
    }

    #[must_use]
    pub fn with_client_key(mut self, key: impl Into<String>) -> Self {
        self.client_key = Some(SecretString::from(key.into()));
        self
    }
}

/// Build the sensitive header value for a token.
pub(crate) fn token_header(token: &SecretString) -> Result<HeaderValue, Error> {
    let mut value =
        HeaderValue::from_str(token.expose_secret()).map_err(|_| Error::NotAuthenticated)?;
    value.set_sensitive(true);
    Ok(value)
}
