//! A basic API client for one target cluster.
//!
//! The [`Client`] wraps a tower service stack assembled by
//! [`Client::build`]: a TLS'd hyper client behind the cluster-URL,
//! admin-auth, and user-auth middleware. Requests carry a
//! [`RequestContext`](crate::RequestContext) extension supplying the
//! end-user identity the middleware acts on.

use bytes::Bytes;
use futures::{future::BoxFuture, Stream, TryStreamExt};
use http::{Request, Response, StatusCode};
use http_body_util::BodyExt;
use hyper_util::{client::legacy::connect::HttpConnector, rt::TokioExecutor};
use serde::de::DeserializeOwned;
use tokio_util::{
    codec::{FramedRead, LinesCodec, LinesCodecError},
    io::StreamReader,
};
use tower::{buffer::Buffer, util::BoxService, BoxError, Layer, Service, ServiceBuilder, ServiceExt};
use tower_http::map_response_body::MapResponseBodyLayer;

use crate::{
    config::Config,
    error::ErrorResponse,
    Error, Result,
};

mod auth;
mod body;
mod config_ext;
pub(crate) mod jwt;
pub mod middleware;
pub mod tls;

pub use body::Body;
pub use config_ext::ConfigExt;

use middleware::{UserAuthLayer, UserAuthParams};

/// Options controlling the per-request transport chain of a [`Client`].
#[derive(Clone, Debug, Default)]
pub struct TransportOptions {
    /// Bypass end-user auth entirely; development only.
    pub local_development: bool,
    /// Impersonate the token subject instead of forwarding the token.
    pub impersonate: bool,
    /// JWT claim naming the user to impersonate; defaults to `email`.
    pub username_claim: Option<String>,
}

impl TransportOptions {
    fn user_auth_params(&self) -> UserAuthParams {
        let defaults = UserAuthParams::default();
        UserAuthParams {
            local_development: self.local_development,
            impersonate: self.impersonate,
            username_claim: self
                .username_claim
                .clone()
                .unwrap_or(defaults.username_claim),
        }
    }
}

/// Client for connecting with a target cluster.
#[derive(Clone)]
pub struct Client {
    // - `Buffer` for cheap clone
    // - `BoxService` for dynamic response future type
    inner: Buffer<Request<Body>, BoxFuture<'static, Result<Response<Body>, BoxError>>>,
    default_ns: String,
}

impl Client {
    /// Create a [`Client`] using a custom `Service` stack.
    ///
    /// [`Client::build`] assembles the default stack from a [`Config`].
    pub fn new<S, B, T>(service: S, default_namespace: T) -> Self
    where
        S: Service<Request<Body>, Response = Response<B>> + Send + 'static,
        S::Future: Send + 'static,
        S::Error: Into<BoxError>,
        B: http_body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
        T: Into<String>,
    {
        // Transform response body to the crate body type and use a type
        // erased error to avoid type parameters.
        let service = MapResponseBodyLayer::new(Body::wrap_body)
            .layer(service)
            .map_err(|e| e.into());
        Self {
            inner: Buffer::new(BoxService::new(service), 1024),
            default_ns: default_namespace.into(),
        }
    }

    /// Assemble the default stack for a cluster config.
    ///
    /// Outermost to innermost: user auth, admin auth, cluster URL assembly,
    /// TLS'd hyper client.
    pub fn build(config: &Config, options: &TransportOptions) -> Result<Self> {
        let connector = {
            let mut http = HttpConnector::new();
            http.enforce_http(false);
            hyper_rustls::HttpsConnectorBuilder::new()
                .with_tls_config(config.rustls_client_config()?)
                .https_or_http()
                .enable_http1()
                .wrap_connector(http)
        };
        let hyper_client: hyper_util::client::legacy::Client<_, Body> =
            hyper_util::client::legacy::Client::builder(TokioExecutor::new()).build(connector);

        let service = ServiceBuilder::new()
            .layer(UserAuthLayer::new(options.user_auth_params()))
            .layer(config.admin_auth_layer()?)
            .layer(config.cluster_url_layer())
            .service(
                MapResponseBodyLayer::new(Body::wrap_body)
                    .layer(hyper_client)
                    .map_err(BoxError::from),
            );

        Ok(Self::new(service, config.default_namespace.clone()))
    }

    /// The client's default namespace
    pub fn default_namespace(&self) -> &str {
        &self.default_ns
    }

    /// Perform a raw HTTP request against the API and return the raw
    /// response back.
    pub async fn send(&self, request: Request<Body>) -> Result<Response<Body>> {
        let mut svc = self.inner.clone();
        let res = svc
            .ready()
            .await
            .map_err(Error::Service)?
            .call(request)
            .await
            .map_err(|err| {
                // Error decorating request
                err.downcast::<Error>()
                    .map(|e| *e)
                    // Error requesting
                    .or_else(|err| err.downcast::<hyper::Error>().map(|err| Error::HyperError(*err)))
                    // Error from another middleware
                    .unwrap_or_else(Error::Service)
            })?;
        Ok(res)
    }

    /// Perform a raw HTTP request against the API and deserialize the
    /// response as JSON to some known type.
    pub async fn request<T>(&self, request: Request<Vec<u8>>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let text = self.request_text(request).await?;
        serde_json::from_str(&text).map_err(|e| {
            tracing::warn!("{}, {:?}", text, e);
            Error::SerdeError(e)
        })
    }

    /// Perform a raw HTTP request against the API and get back the response
    /// as a string
    pub async fn request_text(&self, request: Request<Vec<u8>>) -> Result<String> {
        let res = self.send(request.map(Body::from)).await?;
        let status = res.status();
        let body_bytes = res.into_body().collect().await?.to_bytes();
        let text = String::from_utf8(body_bytes.to_vec()).map_err(Error::FromUtf8)?;
        handle_api_errors(&text, status)?;
        Ok(text)
    }

    /// Perform a raw request and get back a stream of newline-delimited
    /// frames, as returned by watch calls.
    pub async fn request_events(
        &self,
        request: Request<Vec<u8>>,
    ) -> Result<impl Stream<Item = Result<String>>> {
        let res = self.send(request.map(Body::from)).await?;
        let status = res.status();
        if status.is_client_error() || status.is_server_error() {
            let body_bytes = res.into_body().collect().await?.to_bytes();
            let text = String::from_utf8(body_bytes.to_vec()).map_err(Error::FromUtf8)?;
            handle_api_errors(&text, status)?;
            return Err(Error::Service(
                format!("watch request failed with status {status}").into(),
            ));
        }

        let frames = FramedRead::new(
            StreamReader::new(
                res.into_body()
                    .into_stream()
                    .map_err(|e| std::io::Error::other(e.to_string())),
            ),
            LinesCodec::new(),
        );
        Ok(frames.map_err(|e| match e {
            LinesCodecError::Io(e) => Error::ReadEvents(e),
            LinesCodecError::MaxLineLengthExceeded => {
                Error::ReadEvents(std::io::Error::other("max line length exceeded"))
            }
        }))
    }
}

fn handle_api_errors(text: &str, status: StatusCode) -> Result<()> {
    if status.is_client_error() || status.is_server_error() {
        // All 4xx/5xx responses are expected to carry a machine-readable
        // status payload; fall back to the raw body when they do not.
        match serde_json::from_str::<ErrorResponse>(text) {
            Ok(errdata) => Err(Error::Api(errdata)),
            Err(_) => Err(Error::Api(ErrorResponse {
                status: status.to_string(),
                message: text.into(),
                reason: String::new(),
                code: status.as_u16(),
            })),
        }
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_are_surfaced() {
        let body = r#"{"status":"Failure","message":"configmaps \"x\" not found","reason":"NotFound","code":404}"#;
        let err = handle_api_errors(body, StatusCode::NOT_FOUND).unwrap_err();
        match err {
            Error::Api(e) => {
                assert_eq!(e.reason, "NotFound");
                assert_eq!(e.code, 404);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn non_json_errors_fall_back_to_body() {
        let err = handle_api_errors("boom", StatusCode::INTERNAL_SERVER_ERROR).unwrap_err();
        match err {
            Error::Api(e) => {
                assert_eq!(e.message, "boom");
                assert_eq!(e.code, 500);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn success_is_passed_through() {
        assert!(handle_api_errors("{}", StatusCode::OK).is_ok());
    }
}
