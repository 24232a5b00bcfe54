//! Admin credential resolution from a cluster [`Config`](crate::Config).

use base64::Engine;
use http::HeaderValue;
use secrecy::{ExposeSecret, SecretString};

use crate::{config::AuthInfo, error::AuthError};

/// Admin credentials resolved from configuration.
#[derive(Debug, Clone)]
pub(crate) enum Auth {
    None,
    Basic(String, SecretString),
    Bearer(SecretString),
}

impl From<&AuthInfo> for Auth {
    fn from(auth_info: &AuthInfo) -> Self {
        if let Some(token) = &auth_info.token {
            Auth::Bearer(token.clone())
        } else if let (Some(u), Some(p)) = (&auth_info.username, &auth_info.password) {
            Auth::Basic(u.clone(), p.clone())
        } else {
            Auth::None
        }
    }
}

impl Auth {
    /// Render the credentials as an `Authorization` header value.
    pub(crate) fn to_header(&self) -> Result<Option<HeaderValue>, AuthError> {
        let raw = match self {
            Auth::None => return Ok(None),
            Auth::Bearer(token) => format!("Bearer {}", token.expose_secret()),
            Auth::Basic(user, pass) => {
                let encoded = base64::engine::general_purpose::STANDARD
                    .encode(format!("{user}:{}", pass.expose_secret()));
                format!("Basic {encoded}")
            }
        };
        let mut value = HeaderValue::from_str(&raw).map_err(AuthError::InvalidHeader)?;
        value.set_sensitive(true);
        Ok(Some(value))
    }
}
