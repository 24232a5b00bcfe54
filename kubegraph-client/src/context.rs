//! Per-request identity carried through the transport chain.

use secrecy::SecretString;

/// Request-scoped bag attached to each outbound request as an
/// `http::Extensions` entry.
///
/// Built once per inbound gateway request from its headers and routing
/// match, then consumed by the authenticating middleware.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    /// End-user bearer token, when the inbound request carried one.
    pub bearer_token: Option<SecretString>,
    /// Logical workspace for virtual-workspace URL rewriting.
    pub workspace: Option<String>,
}

impl RequestContext {
    /// A context carrying only a bearer token.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            bearer_token: Some(SecretString::from(token.into())),
            workspace: None,
        }
    }

    /// Whether a non-empty bearer token is present.
    pub fn has_token(&self) -> bool {
        use secrecy::ExposeSecret;
        self.bearer_token
            .as_ref()
            .is_some_and(|t| !t.expose_secret().is_empty())
    }
}
