//! GraphQL resolvers translating operations into REST calls.
//!
//! Each resolver obtains the cluster's client from schema data and the
//! end-user [`RequestContext`] from request data, builds the REST request,
//! and attaches the context so the transport chain can authenticate it.

use async_graphql::dynamic::{Field, FieldFuture, FieldValue, InputValue, ResolverContext, TypeRef};
use kubegraph_client::{Client, RequestContext};
use kubegraph_core::{
    DynamicObject, ListParams, ObjectList, Patch, Request, ResourceScope, Selector,
};
use serde_json::Value;

use crate::schema::KindBinding;

fn graphql_err(err: impl std::fmt::Display) -> async_graphql::Error {
    async_graphql::Error::new(err.to_string())
}

fn optional_string(ctx: &ResolverContext<'_>, name: &str) -> Option<String> {
    ctx.args
        .get(name)
        .and_then(|v| v.string().ok().map(String::from))
}

fn namespaced(binding: &KindBinding) -> bool {
    binding.resource.scope == ResourceScope::Namespaced
}

/// Deep-merge `patch` into `target`; objects merge recursively, everything
/// else is replaced.
pub(crate) fn merge_value(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                merge_value(target.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

async fn request_json(
    ctx: &ResolverContext<'_>,
    mut req: http::Request<Vec<u8>>,
) -> async_graphql::Result<Value> {
    let client = ctx.data::<Client>()?;
    let user = ctx.data::<RequestContext>()?;
    req.extensions_mut().insert(user.clone());
    client.request::<Value>(req).await.map_err(graphql_err)
}

fn label_params(ctx: &ResolverContext<'_>) -> async_graphql::Result<ListParams> {
    let mut lp = ListParams::default();
    if let Some(raw) = optional_string(ctx, "labelselector") {
        let selector: Selector = raw.parse().map_err(graphql_err)?;
        if !selector.selects_all() {
            lp = lp.labels(&selector.to_selector_string());
        }
    }
    Ok(lp)
}

/// `Kinds(namespace?, labelselector?): [Kind!]!`
pub(crate) fn list_field(name: &str, binding: &KindBinding) -> Field {
    let binding = binding.clone();
    let is_namespaced = namespaced(&binding);
    let mut field = Field::new(
        name,
        TypeRef::named_nn_list_nn(binding.type_name.clone()),
        move |ctx| {
            let binding = binding.clone();
            FieldFuture::new(async move {
                let namespace = optional_string(&ctx, "namespace");
                let lp = label_params(&ctx)?;
                let mut req = Request::new(binding.resource.url_path(namespace.as_deref()))
                    .list(&lp)
                    .map_err(graphql_err)?;
                let client = ctx.data::<Client>()?;
                let user = ctx.data::<RequestContext>()?;
                req.extensions_mut().insert(user.clone());
                let list: ObjectList = client.request(req).await.map_err(graphql_err)?;
                let mut items = list.items;
                items.sort_by(|a, b| {
                    a.name().unwrap_or_default().cmp(b.name().unwrap_or_default())
                });
                Ok(Some(FieldValue::list(
                    items.into_iter().map(|obj| FieldValue::owned_any(obj.data)),
                )))
            })
        },
    )
    .argument(InputValue::new("labelselector", TypeRef::named(TypeRef::STRING)));
    if is_namespaced {
        field = field.argument(InputValue::new("namespace", TypeRef::named(TypeRef::STRING)));
    }
    field
}

/// `Kind(name!, namespace!): Kind!`
pub(crate) fn get_field(name: &str, binding: &KindBinding) -> Field {
    let binding = binding.clone();
    let is_namespaced = namespaced(&binding);
    let mut field = Field::new(
        name,
        TypeRef::named_nn(binding.type_name.clone()),
        move |ctx| {
            let binding = binding.clone();
            FieldFuture::new(async move {
                let name = ctx.args.try_get("name")?.string()?.to_string();
                let namespace = optional_string(&ctx, "namespace");
                let req = Request::new(binding.resource.url_path(namespace.as_deref()))
                    .get(&name)
                    .map_err(graphql_err)?;
                let obj = request_json(&ctx, req).await?;
                Ok(Some(FieldValue::owned_any(obj)))
            })
        },
    )
    .argument(InputValue::new("name", TypeRef::named_nn(TypeRef::STRING)));
    if is_namespaced {
        field = field.argument(InputValue::new("namespace", TypeRef::named_nn(TypeRef::STRING)));
    }
    field
}

/// `createKind(namespace!, object!): Kind`
pub(crate) fn create_field(binding: &KindBinding) -> Field {
    let field_name = format!("create{}", binding.resource.kind);
    let binding = binding.clone();
    let is_namespaced = namespaced(&binding);
    let input_type = binding.input_type.clone();
    let mut field = Field::new(
        field_name,
        TypeRef::named(binding.type_name.clone()),
        move |ctx| {
            let binding = binding.clone();
            FieldFuture::new(async move {
                let input: Value = ctx.args.try_get("object")?.deserialize()?;
                let namespace = optional_string(&ctx, "namespace");

                let mut obj = DynamicObject::typed(&binding.resource.gvk());
                merge_value(&mut obj.data, &input);
                obj.set_gvk(&binding.resource.gvk());
                if let Some(ns) = &namespace {
                    obj.set_namespace(ns);
                }
                if obj.name().is_none() {
                    return Err(graphql_err("metadata.name is required"));
                }

                let req = Request::new(binding.resource.url_path(namespace.as_deref()))
                    .create(serde_json::to_vec(&obj.data).map_err(graphql_err)?)
                    .map_err(graphql_err)?;
                let created = request_json(&ctx, req).await?;
                Ok(Some(FieldValue::owned_any(created)))
            })
        },
    )
    .argument(InputValue::new("object", TypeRef::named_nn(input_type)));
    if is_namespaced {
        field = field.argument(InputValue::new("namespace", TypeRef::named_nn(TypeRef::STRING)));
    }
    field
}

/// `updateKind(namespace!, object!): Kind`
///
/// The user supplies a partial object; the current object is fetched to
/// surface missing targets early, then a merge patch carries the input.
pub(crate) fn update_field(binding: &KindBinding) -> Field {
    let field_name = format!("update{}", binding.resource.kind);
    let binding = binding.clone();
    let is_namespaced = namespaced(&binding);
    let input_type = binding.input_type.clone();
    let mut field = Field::new(
        field_name,
        TypeRef::named(binding.type_name.clone()),
        move |ctx| {
            let binding = binding.clone();
            FieldFuture::new(async move {
                let input: Value = ctx.args.try_get("object")?.deserialize()?;
                let namespace = optional_string(&ctx, "namespace");
                let name = input
                    .pointer("/metadata/name")
                    .and_then(Value::as_str)
                    .map(String::from)
                    .ok_or_else(|| graphql_err("metadata.name is required"))?;

                let request = Request::new(binding.resource.url_path(namespace.as_deref()));
                // confirm the object exists before patching
                let current = request.get(&name).map_err(graphql_err)?;
                request_json(&ctx, current).await?;

                let req = request
                    .patch(&name, &Patch::Merge(input))
                    .map_err(graphql_err)?;
                let patched = request_json(&ctx, req).await?;
                Ok(Some(FieldValue::owned_any(patched)))
            })
        },
    )
    .argument(InputValue::new("object", TypeRef::named_nn(input_type)));
    if is_namespaced {
        field = field.argument(InputValue::new("namespace", TypeRef::named_nn(TypeRef::STRING)));
    }
    field
}

/// `deleteKind(name!, namespace!): Boolean`
pub(crate) fn delete_field(binding: &KindBinding) -> Field {
    let field_name = format!("delete{}", binding.resource.kind);
    let binding = binding.clone();
    let is_namespaced = namespaced(&binding);
    let mut field = Field::new(field_name, TypeRef::named(TypeRef::BOOLEAN), move |ctx| {
        let binding = binding.clone();
        FieldFuture::new(async move {
            let name = ctx.args.try_get("name")?.string()?.to_string();
            let namespace = optional_string(&ctx, "namespace");
            let req = Request::new(binding.resource.url_path(namespace.as_deref()))
                .delete(&name)
                .map_err(graphql_err)?;
            request_json(&ctx, req).await?;
            Ok(Some(FieldValue::value(async_graphql::Value::from(true))))
        })
    })
    .argument(InputValue::new("name", TypeRef::named_nn(TypeRef::STRING)));
    if is_namespaced {
        field = field.argument(InputValue::new("namespace", TypeRef::named_nn(TypeRef::STRING)));
    }
    field
}
