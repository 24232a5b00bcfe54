//! GraphQL subscription fields backed by watch streams.
//!
//! Each subscription starts one watch, tracks seen objects in a
//! [`WatchSession`], and emits a value whenever a field the client selected
//! changed. The stream ends when the upstream watch terminates or the
//! client disconnects; watches are not re-established.

use async_graphql::dynamic::{
    FieldValue, InputValue, ResolverContext, SubscriptionField, SubscriptionFieldFuture, TypeRef,
};
use futures::StreamExt;
use kubegraph_client::{Client, RequestContext};
use kubegraph_core::{ListParams, ResourceScope, Selector};
use kubegraph_runtime::{diff::FieldPath, watcher, WatchSession};
use serde_json::Value;

use crate::schema::KindBinding;

fn graphql_err(err: impl std::fmt::Display) -> async_graphql::Error {
    async_graphql::Error::new(err.to_string())
}

/// Dotted field paths of the client's selection set, driving the diff.
fn selected_paths(ctx: &ResolverContext<'_>) -> Vec<FieldPath> {
    let mut out = Vec::new();
    for sub in ctx.field().selection_set() {
        collect_paths(sub, &mut Vec::new(), &mut out);
    }
    out
}

fn collect_paths(
    field: async_graphql::SelectionField<'_>,
    prefix: &mut Vec<String>,
    out: &mut Vec<FieldPath>,
) {
    prefix.push(field.name().to_string());
    let children: Vec<_> = field.selection_set().collect();
    if children.is_empty() {
        out.push(prefix.clone());
    } else {
        for child in children {
            collect_paths(child, prefix, out);
        }
    }
    prefix.pop();
}

fn subscribe_to_all(ctx: &ResolverContext<'_>) -> bool {
    ctx.args
        .get("subscribeToAll")
        .and_then(|v| v.boolean().ok())
        .unwrap_or(false)
}

fn emission_to_field_value<'a>(value: Value, list: bool) -> FieldValue<'a> {
    if list {
        let items = value.as_array().cloned().unwrap_or_default();
        FieldValue::list(items.into_iter().map(FieldValue::owned_any))
    } else if value.is_null() {
        FieldValue::NULL
    } else {
        FieldValue::owned_any(value)
    }
}

/// `{version}{Group}{Kind}(name!, namespace!, subscribeToAll?): Kind`
pub(crate) fn item_subscription(field_name: &str, binding: &KindBinding) -> SubscriptionField {
    let binding = binding.clone();
    let is_namespaced = binding.resource.scope == ResourceScope::Namespaced;
    let mut field = SubscriptionField::new(
        field_name,
        TypeRef::named(binding.type_name.clone()),
        move |ctx| item_subscription_future(ctx, binding.clone()),
    )
    .argument(InputValue::new("name", TypeRef::named_nn(TypeRef::STRING)))
    .argument(InputValue::new("subscribeToAll", TypeRef::named(TypeRef::BOOLEAN)));
    if is_namespaced {
        field = field.argument(InputValue::new("namespace", TypeRef::named_nn(TypeRef::STRING)));
    }
    field
}

fn item_subscription_future<'a>(
    ctx: ResolverContext<'a>,
    binding: KindBinding,
) -> SubscriptionFieldFuture<'a> {
    let prepared = (|| {
        let name = ctx.args.try_get("name")?.string()?.to_string();
        let namespace = ctx
            .args
            .get("namespace")
            .and_then(|v| v.string().ok().map(String::from));
        let sub_all = subscribe_to_all(&ctx);
        let paths = selected_paths(&ctx);
        let client = ctx.data::<Client>()?.clone();
        let user = ctx.data::<RequestContext>()?.clone();
        Ok::<_, async_graphql::Error>((name, namespace, sub_all, paths, client, user))
    })();
    SubscriptionFieldFuture::new(async move {
        let (name, namespace, sub_all, paths, client, user) = prepared?;

        let session = WatchSession::item(namespace.as_deref().unwrap_or(""), &name, sub_all, paths);
        let params = ListParams::default().fields(&format!("metadata.name={name}"));
        let events = watcher(client, binding.resource.clone(), namespace, params, user);

        Ok::<_, async_graphql::Error>(drive_session(events, session, false))
    })
}

/// `{version}{Group}{Kinds}(namespace!, labelselector?, subscribeToAll?): [Kind!]`
pub(crate) fn list_subscription(field_name: &str, binding: &KindBinding) -> SubscriptionField {
    let binding = binding.clone();
    let is_namespaced = binding.resource.scope == ResourceScope::Namespaced;
    let mut field = SubscriptionField::new(
        field_name,
        TypeRef::named_nn_list(binding.type_name.clone()),
        move |ctx| list_subscription_future(ctx, binding.clone()),
    )
    .argument(InputValue::new("labelselector", TypeRef::named(TypeRef::STRING)))
    .argument(InputValue::new("subscribeToAll", TypeRef::named(TypeRef::BOOLEAN)));
    if is_namespaced {
        field = field.argument(InputValue::new("namespace", TypeRef::named_nn(TypeRef::STRING)));
    }
    field
}

fn list_subscription_future<'a>(
    ctx: ResolverContext<'a>,
    binding: KindBinding,
) -> SubscriptionFieldFuture<'a> {
    let prepared = (|| {
        let namespace = ctx
            .args
            .get("namespace")
            .and_then(|v| v.string().ok().map(String::from));
        let sub_all = subscribe_to_all(&ctx);
        let paths = selected_paths(&ctx);

        let mut params = ListParams::default();
        if let Some(raw) = ctx
            .args
            .get("labelselector")
            .and_then(|v| v.string().ok().map(String::from))
        {
            let selector: Selector = raw.parse().map_err(graphql_err)?;
            if !selector.selects_all() {
                params = params.labels(&selector.to_selector_string());
            }
        }

        let client = ctx.data::<Client>()?.clone();
        let user = ctx.data::<RequestContext>()?.clone();

        Ok::<_, async_graphql::Error>((namespace, sub_all, paths, params, client, user))
    })();
    SubscriptionFieldFuture::new(async move {
        let (namespace, sub_all, paths, params, client, user) = prepared?;

        let session = WatchSession::list(sub_all, paths);
        let events = watcher(client, binding.resource.clone(), namespace, params, user);

        Ok::<_, async_graphql::Error>(drive_session(events, session, true))
    })
}

/// Fold watch events through a session, yielding only warranted emissions.
///
/// Watch-setup failures and mid-stream errors terminate the stream without
/// a value; the transport layer then closes the connection.
fn drive_session<'a>(
    events: impl futures::Stream<Item = kubegraph_runtime::watcher::Result<kubegraph_core::WatchEvent<kubegraph_core::DynamicObject>>>
        + Send
        + 'a,
    mut session: WatchSession,
    list: bool,
) -> impl futures::Stream<Item = async_graphql::Result<FieldValue<'a>>> + Send + 'a {
    async_stream::stream! {
        futures::pin_mut!(events);
        while let Some(event) = events.next().await {
            match event {
                Ok(event) => {
                    if let Some(value) = session.apply(event) {
                        yield Ok(emission_to_field_value(value, list));
                    }
                }
                Err(err) => {
                    tracing::debug!(%err, "subscription watch terminated");
                    break;
                }
            }
        }
    }
}
