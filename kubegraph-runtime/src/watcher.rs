//! Watches a resource collection for changes.

use futures::{Stream, StreamExt};
use kubegraph_client::{Client, RequestContext};
use kubegraph_core::{
    error::ErrorResponse, ApiResource, DynamicObject, ListParams, Request, WatchEvent,
};
use thiserror::Error;

/// Possible errors while driving a watch stream
#[derive(Debug, Error)]
pub enum Error {
    /// The watch request could not be built
    #[error("failed to build watch request: {0}")]
    BuildRequest(#[source] kubegraph_core::Error),

    /// The watch call failed before any event arrived
    #[error("failed to start watching: {0}")]
    WatchStartFailed(#[source] kubegraph_client::Error),

    /// The stream failed mid-flight
    #[error("watch stream failed: {0}")]
    WatchFailed(#[source] kubegraph_client::Error),

    /// The server embedded an error frame in the stream
    #[error("error returned by apiserver during watch: {0}")]
    WatchError(#[source] ErrorResponse),

    /// A frame did not decode as a watch event
    #[error("failed to decode watch frame: {0}")]
    DecodeFrame(#[source] serde_json::Error),
}

/// Result alias for watch operations
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Watch a resource collection, decoding newline-delimited frames into
/// events.
///
/// The watch starts without a resource version, so the server first
/// synthesizes `ADDED` events for the current state. Bookmarks are skipped;
/// embedded error frames terminate the stream with an error. The stream is
/// not re-established when the upstream closes it.
pub fn watcher(
    client: Client,
    resource: ApiResource,
    namespace: Option<String>,
    params: ListParams,
    ctx: RequestContext,
) -> impl Stream<Item = Result<WatchEvent<DynamicObject>>> {
    async_stream::try_stream! {
        let path = resource.url_path(namespace.as_deref());
        let mut req = Request::new(path)
            .watch(&params, None)
            .map_err(Error::BuildRequest)?;
        req.extensions_mut().insert(ctx);

        let stream = client
            .request_events(req)
            .await
            .map_err(Error::WatchStartFailed)?;
        futures::pin_mut!(stream);

        while let Some(line) = stream.next().await {
            let line = line.map_err(Error::WatchFailed)?;
            if line.trim().is_empty() {
                continue;
            }
            let event: WatchEvent<DynamicObject> =
                serde_json::from_str(&line).map_err(Error::DecodeFrame)?;
            match event {
                WatchEvent::Bookmark(_) => continue,
                WatchEvent::Error(status) => {
                    tracing::debug!(code = status.code, reason = %status.reason, "watch error frame");
                    Err(Error::WatchError(status))?;
                }
                other => yield other,
            }
        }
        tracing::debug!(kind = %resource.kind, "watch stream ended");
    }
}
