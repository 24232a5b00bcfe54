//! OpenAPI → GraphQL schema synthesis.
//!
//! Builds a typed GraphQL graph from a cluster's definitions map: query and
//! mutation roots organized `root → group → version → kind`, flat
//! subscription fields, input types for create/update, and a shared
//! `Metadata` type. Resolver closures capture the original (unsanitized)
//! group so API calls address the real resource paths.

pub mod definitions;
pub mod names;

use std::collections::{BTreeMap, HashSet};

use async_graphql::dynamic::{
    Field, FieldFuture, FieldValue, InputObject, InputValue, Object, Scalar, Schema, Subscription,
    TypeRef,
};
use kubegraph_client::Client;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{resolvers, subscriptions};
use definitions::{KindDefinition, Property};
use names::{pascal, plural_pascal, sanitize_field, sanitize_group, TypeNames};

/// Scalar type for free-form string maps (labels, annotations, data).
pub const STRING_MAP_SCALAR: &str = "StringMap";
/// Shared object type replacing each kind's `metadata`.
pub const METADATA_TYPE: &str = "Metadata";
/// Input counterpart of [`METADATA_TYPE`].
pub const METADATA_INPUT_TYPE: &str = "MetadataInput";

/// A dynamically built GraphQL schema for one cluster.
pub type GatewaySchema = Schema;

/// Errors from schema synthesis
#[derive(Debug, Error)]
pub enum BuildError {
    /// The definitions map produced no servable kinds
    #[error("definitions contain no servable kinds")]
    NoServableKinds,

    /// The synthesized schema was rejected by the GraphQL library
    #[error("invalid GraphQL schema: {0}")]
    Invalid(String),
}

/// A kind wired into the schema: addressing info plus its GraphQL names.
#[derive(Clone, Debug)]
pub struct KindBinding {
    /// Addressing information, carrying the original group name.
    pub resource: kubegraph_core::ApiResource,
    /// GraphQL object type name.
    pub type_name: String,
    /// GraphQL input type name for create/update.
    pub input_type: String,
}

/// How a generated field renders its JSON value.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Shape {
    /// Leaf value rendered directly.
    Scalar,
    /// Whole subtree rendered as a scalar value.
    StringMap,
    /// Descend into a nested object type.
    Object,
    /// List of leaf values.
    ListScalar,
    /// List of nested objects.
    ListObject,
}

/// Marker parent value for group/version wrapper objects.
pub(crate) struct Wrapper;

/// Build the GraphQL schema for one cluster from its definitions map and
/// attach the cluster's client.
pub fn build_schema(definitions: &Map<String, Value>, client: Client) -> Result<GatewaySchema, BuildError> {
    let kinds: Vec<KindDefinition> = definitions.values().filter_map(KindDefinition::from_value).collect();
    if kinds.is_empty() {
        return Err(BuildError::NoServableKinds);
    }

    let mut state = BuilderState::default();

    // group -> version -> bindings, keyed by the sanitized group name
    let mut groups: BTreeMap<String, GroupEntry> = BTreeMap::new();
    for kind in kinds {
        let sanitized = sanitize_group(&kind.resource.group);
        let owner = format!("{}/{}", kind.resource.group, kind.resource.kind);
        let type_name = state.names.claim(&kind.resource.kind, &sanitized, &owner);

        // A kind appearing under several versions shares one object type;
        // the first version's definition wins.
        let (type_name, input_type) = if state.attempted.contains(&type_name) {
            if !state.built.contains(&type_name) {
                continue;
            }
            let input_type = format!("{type_name}Input");
            (type_name, input_type)
        } else {
            state.attempted.insert(type_name.clone());
            let Some(type_name) = state.build_kind_type(&type_name, &kind.definition) else {
                continue;
            };
            state.built.insert(type_name.clone());
            let input_type = state.build_kind_input(&type_name, &kind.definition);
            (type_name, input_type)
        };

        let binding = KindBinding {
            resource: kind.resource.clone(),
            type_name,
            input_type,
        };
        groups
            .entry(sanitized.clone())
            .or_insert_with(|| GroupEntry::new(sanitized))
            .versions
            .entry(kind.resource.version.clone())
            .or_default()
            .push(binding);
    }

    if groups.is_empty() {
        return Err(BuildError::NoServableKinds);
    }

    let mut query = Object::new("Query");
    let mut mutation = Object::new("Mutation");
    let mut subscription = Subscription::new("Subscription");

    for entry in groups.values() {
        let group_type = format!("{}Group", pascal(&entry.sanitized));
        let mutation_group_type = format!("{group_type}Mutation");
        let mut group_obj = Object::new(&group_type);
        let mut mutation_group_obj = Object::new(&mutation_group_type);
        // fields already placed on the group roots (versions and promoted kinds)
        let mut promoted: HashSet<String> = entry.versions.keys().cloned().collect();

        for (version, bindings) in &entry.versions {
            let version_type = format!("{group_type}{}", pascal(version));
            let mutation_version_type = format!("{mutation_group_type}{}", pascal(version));
            let mut version_obj = Object::new(&version_type);
            let mut mutation_version_obj = Object::new(&mutation_version_type);

            for binding in bindings {
                let singular = binding.resource.kind.clone();
                let plural = plural_pascal(&binding.resource.kind);

                version_obj = version_obj
                    .field(resolvers::list_field(&plural, binding))
                    .field(resolvers::get_field(&singular, binding));
                mutation_version_obj = mutation_version_obj
                    .field(resolvers::create_field(binding))
                    .field(resolvers::update_field(binding))
                    .field(resolvers::delete_field(binding));

                // promote the storage version's fields onto the group root
                if promoted.insert(singular.clone()) {
                    promoted.insert(plural.clone());
                    group_obj = group_obj
                        .field(resolvers::list_field(&plural, binding))
                        .field(resolvers::get_field(&singular, binding));
                    mutation_group_obj = mutation_group_obj
                        .field(resolvers::create_field(binding))
                        .field(resolvers::update_field(binding))
                        .field(resolvers::delete_field(binding));
                }

                let base = format!("{version}{}{}", pascal(&entry.sanitized), binding.resource.kind);
                subscription = subscription
                    .field(subscriptions::item_subscription(&base, binding))
                    .field(subscriptions::list_subscription(
                        &format!("{version}{}{plural}", pascal(&entry.sanitized)),
                        binding,
                    ));
            }

            group_obj = group_obj.field(wrapper_field(version, &version_type));
            mutation_group_obj = mutation_group_obj.field(wrapper_field(version, &mutation_version_type));
            state.types.push(version_obj);
            state.types.push(mutation_version_obj);
        }

        query = query.field(wrapper_field(&entry.sanitized, &group_type));
        mutation = mutation.field(wrapper_field(&entry.sanitized, &mutation_group_type));
        state.types.push(group_obj);
        state.types.push(mutation_group_obj);
    }

    let mut builder = Schema::build("Query", Some("Mutation"), Some("Subscription"))
        .register(Scalar::new(STRING_MAP_SCALAR))
        .register(metadata_type())
        .register(metadata_input());
    for object in state.types {
        builder = builder.register(object);
    }
    for input in state.inputs {
        builder = builder.register(input);
    }
    builder
        .register(query)
        .register(mutation)
        .register(subscription)
        .data(client)
        .finish()
        .map_err(|e| BuildError::Invalid(e.to_string()))
}

struct GroupEntry {
    sanitized: String,
    versions: BTreeMap<String, Vec<KindBinding>>,
}

impl GroupEntry {
    fn new(sanitized: String) -> Self {
        Self {
            sanitized,
            versions: BTreeMap::new(),
        }
    }
}

#[derive(Default)]
struct BuilderState {
    types: Vec<Object>,
    inputs: Vec<InputObject>,
    names: TypeNames,
    /// Kind type names whose build has been tried.
    attempted: HashSet<String>,
    /// Kind type names that produced a registered type.
    built: HashSet<String>,
}

impl BuilderState {
    /// Build the output object type for a kind. Returns `None` when every
    /// field of the definition was skipped.
    fn build_kind_type(&mut self, type_name: &str, definition: &definitions::Definition) -> Option<String> {
        self.build_object_type(type_name, &definition.properties, &definition.required)
    }

    fn build_object_type(
        &mut self,
        type_name: &str,
        properties: &BTreeMap<String, Property>,
        required: &[String],
    ) -> Option<String> {
        let mut object = Object::new(type_name);
        let mut fields = 0usize;

        for (json_key, prop) in properties {
            let field_name = sanitize_field(json_key);
            let is_required = required.iter().any(|r| r == json_key);

            let field = if json_key == "metadata" {
                value_field(&field_name, json_key, TypeRef::named(METADATA_TYPE), Shape::Object)
            } else {
                let Some((type_ref, shape)) = self.field_type(type_name, &field_name, prop, is_required)
                else {
                    continue;
                };
                value_field(&field_name, json_key, type_ref, shape)
            };
            object = object.field(field);
            fields += 1;
        }

        // empty object types are rejected by GraphQL; skip them entirely
        if fields == 0 {
            return None;
        }
        self.types.push(object);
        Some(type_name.to_string())
    }

    /// Map a property to a GraphQL type reference plus its render shape.
    fn field_type(
        &mut self,
        parent_type: &str,
        field_name: &str,
        prop: &Property,
        required: bool,
    ) -> Option<(TypeRef, Shape)> {
        let named = |name: &str| {
            if required {
                TypeRef::named_nn(name)
            } else {
                TypeRef::named(name)
            }
        };
        match prop.schema_type.as_deref() {
            Some("string") => Some((named(TypeRef::STRING), Shape::Scalar)),
            Some("boolean") => Some((named(TypeRef::BOOLEAN), Shape::Scalar)),
            Some("integer") => Some((named(TypeRef::INT), Shape::Scalar)),
            Some("number") => Some((named(TypeRef::FLOAT), Shape::Scalar)),
            Some("array") => {
                let items = prop.items.as_deref()?;
                match items.schema_type.as_deref() {
                    Some("string") => Some((TypeRef::named_list(TypeRef::STRING), Shape::ListScalar)),
                    Some("boolean") => Some((TypeRef::named_list(TypeRef::BOOLEAN), Shape::ListScalar)),
                    Some("integer") => Some((TypeRef::named_list(TypeRef::INT), Shape::ListScalar)),
                    Some("number") => Some((TypeRef::named_list(TypeRef::FLOAT), Shape::ListScalar)),
                    _ if items.is_map() => {
                        Some((TypeRef::named_list(STRING_MAP_SCALAR), Shape::ListScalar))
                    }
                    _ if !items.properties.is_empty() => {
                        let item_type = format!("{parent_type}{}", pascal(field_name));
                        let item_type = self.build_object_type(&item_type, &items.properties, &items.required)?;
                        Some((TypeRef::named_list(item_type), Shape::ListObject))
                    }
                    _ => None,
                }
            }
            _ if prop.is_map() => Some((named(STRING_MAP_SCALAR), Shape::StringMap)),
            _ if !prop.properties.is_empty() => {
                let nested = format!("{parent_type}{}", pascal(field_name));
                let nested = self.build_object_type(&nested, &prop.properties, &prop.required)?;
                let type_ref = if required {
                    TypeRef::named_nn(nested)
                } else {
                    TypeRef::named(nested)
                };
                Some((type_ref, Shape::Object))
            }
            _ => None,
        }
    }

    /// Build the input type for a kind; always non-empty since `metadata`
    /// is always present.
    fn build_kind_input(&mut self, type_name: &str, definition: &definitions::Definition) -> String {
        let input_name = format!("{type_name}Input");
        let mut input = InputObject::new(&input_name);
        input = input.field(InputValue::new("metadata", TypeRef::named(METADATA_INPUT_TYPE)));

        for (json_key, prop) in &definition.properties {
            // type identity is stamped by the resolver; server state is not an input
            if matches!(json_key.as_str(), "metadata" | "apiVersion" | "kind" | "status") {
                continue;
            }
            let field_name = sanitize_field(json_key);
            let is_required = definition.required.iter().any(|r| r == json_key);
            if let Some(type_ref) = self.input_field_type(&input_name, &field_name, prop, is_required) {
                input = input.field(InputValue::new(field_name, type_ref));
            }
        }

        self.inputs.push(input);
        input_name
    }

    fn input_field_type(
        &mut self,
        parent_type: &str,
        field_name: &str,
        prop: &Property,
        required: bool,
    ) -> Option<TypeRef> {
        let named = |name: &str| {
            if required {
                TypeRef::named_nn(name)
            } else {
                TypeRef::named(name)
            }
        };
        match prop.schema_type.as_deref() {
            Some("string") => Some(named(TypeRef::STRING)),
            Some("boolean") => Some(named(TypeRef::BOOLEAN)),
            Some("integer") => Some(named(TypeRef::INT)),
            Some("number") => Some(named(TypeRef::FLOAT)),
            Some("array") => {
                let items = prop.items.as_deref()?;
                match items.schema_type.as_deref() {
                    Some("string") => Some(TypeRef::named_list(TypeRef::STRING)),
                    Some("boolean") => Some(TypeRef::named_list(TypeRef::BOOLEAN)),
                    Some("integer") => Some(TypeRef::named_list(TypeRef::INT)),
                    Some("number") => Some(TypeRef::named_list(TypeRef::FLOAT)),
                    _ if items.is_map() => Some(TypeRef::named_list(STRING_MAP_SCALAR)),
                    _ if !items.properties.is_empty() => {
                        let item_type = format!("{parent_type}{}", pascal(field_name));
                        let item_type =
                            self.build_input_object(&item_type, &items.properties, &items.required)?;
                        Some(TypeRef::named_list(item_type))
                    }
                    _ => None,
                }
            }
            _ if prop.is_map() => Some(named(STRING_MAP_SCALAR)),
            _ if !prop.properties.is_empty() => {
                let nested = format!("{parent_type}{}", pascal(field_name));
                let nested = self.build_input_object(&nested, &prop.properties, &prop.required)?;
                Some(if required {
                    TypeRef::named_nn(nested)
                } else {
                    TypeRef::named(nested)
                })
            }
            _ => None,
        }
    }

    fn build_input_object(
        &mut self,
        type_name: &str,
        properties: &BTreeMap<String, Property>,
        required: &[String],
    ) -> Option<String> {
        let mut input = InputObject::new(type_name);
        let mut fields = 0usize;
        for (json_key, prop) in properties {
            let field_name = sanitize_field(json_key);
            let is_required = required.iter().any(|r| r == json_key);
            if let Some(type_ref) = self.input_field_type(type_name, &field_name, prop, is_required) {
                input = input.field(InputValue::new(field_name, type_ref));
                fields += 1;
            }
        }
        if fields == 0 {
            return None;
        }
        self.inputs.push(input);
        Some(type_name.to_string())
    }
}

/// A field resolving a JSON value out of the parent object.
///
/// `field_name` is the (sanitized) GraphQL name; `json_key` is the key
/// looked up in the parent's JSON tree.
pub(crate) fn value_field(field_name: &str, json_key: &str, type_ref: TypeRef, shape: Shape) -> Field {
    let key = json_key.to_string();
    Field::new(field_name, type_ref, move |ctx| {
        let key = key.clone();
        FieldFuture::new(async move {
            let parent = ctx.parent_value.try_downcast_ref::<Value>()?;
            let Some(child) = parent.get(&key) else {
                return Ok(None);
            };
            if child.is_null() {
                return Ok(None);
            }
            Ok(Some(render_value(child, shape)))
        })
    })
}

pub(crate) fn render_value(child: &Value, shape: Shape) -> FieldValue<'static> {
    match shape {
        Shape::Scalar | Shape::StringMap => FieldValue::value(to_graphql_value(child)),
        Shape::Object => FieldValue::owned_any(child.clone()),
        Shape::ListScalar => FieldValue::list(
            child
                .as_array()
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .map(|v| FieldValue::value(to_graphql_value(&v))),
        ),
        Shape::ListObject => FieldValue::list(
            child
                .as_array()
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .map(FieldValue::owned_any),
        ),
    }
}

pub(crate) fn to_graphql_value(value: &Value) -> async_graphql::Value {
    async_graphql::Value::from_json(value.clone()).unwrap_or(async_graphql::Value::Null)
}

/// A structural field that only exists to unwrap group/version nesting.
fn wrapper_field(name: &str, type_name: &str) -> Field {
    Field::new(name, TypeRef::named_nn(type_name), |_ctx| {
        FieldFuture::new(async move { Ok(Some(FieldValue::owned_any(Wrapper))) })
    })
}

fn metadata_type() -> Object {
    Object::new(METADATA_TYPE)
        .field(value_field("name", "name", TypeRef::named(TypeRef::STRING), Shape::Scalar))
        .field(value_field(
            "namespace",
            "namespace",
            TypeRef::named(TypeRef::STRING),
            Shape::Scalar,
        ))
        .field(value_field(
            "labels",
            "labels",
            TypeRef::named(STRING_MAP_SCALAR),
            Shape::StringMap,
        ))
        .field(value_field(
            "annotations",
            "annotations",
            TypeRef::named(STRING_MAP_SCALAR),
            Shape::StringMap,
        ))
}

fn metadata_input() -> InputObject {
    InputObject::new(METADATA_INPUT_TYPE)
        .field(InputValue::new("name", TypeRef::named(TypeRef::STRING)))
        .field(InputValue::new("namespace", TypeRef::named(TypeRef::STRING)))
        .field(InputValue::new("labels", TypeRef::named(STRING_MAP_SCALAR)))
        .field(InputValue::new("annotations", TypeRef::named(STRING_MAP_SCALAR)))
}
