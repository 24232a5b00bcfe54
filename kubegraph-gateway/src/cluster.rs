//! One served cluster: schema, client, and lifecycle handle.

use std::path::{Path, PathBuf};

use async_graphql::dynamic::Schema;
use kubegraph_client::{Body, Client, Config, RequestContext, TransportOptions};
use kubegraph_core::SchemaArtifact;
use tokio_util::sync::CancellationToken;

use crate::{schema, settings::Settings, Error, Result};

/// A fully wired target cluster.
///
/// Owned by the registry while registered; dropped (and cancelled) on
/// removal or replacement.
pub struct TargetCluster {
    name: String,
    source_path: PathBuf,
    cluster_url: http::Uri,
    client: Client,
    schema: Schema,
    cancel: CancellationToken,
}

impl TargetCluster {
    /// Build a cluster from a schema artifact on disk.
    ///
    /// Reads and parses the file, builds the REST config and client with
    /// the per-request transport chain, and synthesizes the GraphQL schema
    /// from the artifact's definitions.
    pub fn build(name: &str, path: &Path, settings: &Settings) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|source| Error::ReadArtifact {
            path: path.to_path_buf(),
            source,
        })?;
        let artifact = SchemaArtifact::parse(&bytes)?;
        let metadata = artifact.metadata.clone().unwrap_or_default();
        let config = Config::from_metadata(&metadata)?;

        let options = TransportOptions {
            local_development: settings.local_development,
            impersonate: settings.gateway.should_impersonate,
            username_claim: Some(settings.gateway.username_claim.clone()),
        };
        let client = Client::build(&config, &options)?;
        let schema = schema::build_schema(&artifact.definitions, client.clone())?;

        Ok(Self {
            name: name.to_string(),
            source_path: path.to_path_buf(),
            cluster_url: config.cluster_url,
            client,
            schema,
            cancel: CancellationToken::new(),
        })
    }

    /// The served cluster name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The artifact file this cluster was built from.
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// The upstream API server URL.
    pub fn cluster_url(&self) -> &http::Uri {
        &self.cluster_url
    }

    /// The cluster's GraphQL schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Cancellation handle tied to this cluster's lifetime.
    ///
    /// Fired when the cluster is removed; long-lived subscription streams
    /// select on it so removal tears them down.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel in-flight work against this cluster.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Execute one GraphQL request with the given end-user context.
    pub async fn execute(
        &self,
        request: async_graphql::Request,
        ctx: RequestContext,
    ) -> async_graphql::Response {
        self.schema.execute(request.data(ctx)).await
    }

    /// Execute a subscription request as a response stream.
    pub fn execute_stream(
        &self,
        request: async_graphql::Request,
        ctx: RequestContext,
    ) -> impl futures::Stream<Item = async_graphql::Response> + Send + 'static {
        self.schema.execute_stream(request.data(ctx))
    }

    /// Actively validate an end-user token by listing namespaces upstream.
    ///
    /// `200`/`403` both prove the token authenticated; `401` means it did
    /// not.
    pub async fn check_token(&self, ctx: &RequestContext) -> Result<http::StatusCode, kubegraph_client::Error> {
        let mut req = http::Request::get("/api/v1/namespaces")
            .body(Body::empty())
            .map_err(kubegraph_client::Error::HttpError)?;
        req.extensions_mut().insert(ctx.clone());
        let res = self.client.send(req).await?;
        Ok(res.status())
    }
}

impl Drop for TargetCluster {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
