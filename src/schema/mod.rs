//! The composed supergraph schema and the federation metadata extracted from
//! its `@join__*` directives.

pub(crate) mod field_set;

use apollo_compiler::ast;
use apollo_compiler::schema::{Directive, ExtendedType};
use apollo_compiler::validation::Valid;
use apollo_compiler::{Name, Node, Schema};
use indexmap::{IndexMap, IndexSet};

use crate::error::{FederationError, SingleFederationError};

const JOIN_GRAPH_ENUM: &str = "join__Graph";
const JOIN_GRAPH_DIRECTIVE: &str = "join__graph";
const JOIN_TYPE_DIRECTIVE: &str = "join__type";
const JOIN_FIELD_DIRECTIVE: &str = "join__field";

/// One subgraph contributing to the supergraph, as declared by a
/// `join__Graph` enum value carrying `@join__graph(name:, url:)`.
#[derive(Debug, Clone)]
pub struct SubgraphInfo {
    pub name: Name,
    pub url: String,
}

/// Federation facts about one composite type: the key field sets it
/// declares, keyed by the subgraph that owns each key, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct TypeFederationMetadata {
    /// Every subgraph that declares this type at all (via `@join__type`),
    /// whether or not it contributes a key, in declaration order.
    pub owning_graphs: IndexSet<Name>,
    pub keys: IndexMap<Name, Vec<Vec<Name>>>,
}

impl TypeFederationMetadata {
    pub fn is_entity(&self) -> bool {
        !self.keys.is_empty()
    }

    /// All keys declared on this type in declaration order, annotated with
    /// the subgraph that declared them.
    pub fn all_keys(&self) -> impl Iterator<Item = (&Name, &Vec<Name>)> {
        self.keys
            .iter()
            .flat_map(|(graph, keys)| keys.iter().map(move |key| (graph, key)))
    }
}

/// Per-subgraph resolvability facts about one field, derived from that
/// field's `@join__field` applications.
#[derive(Debug, Clone)]
pub struct FieldOwnership {
    pub requires: Vec<Name>,
    pub provides: Vec<Name>,
    pub external: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FieldFederationMetadata {
    /// Ownership info per subgraph that can see this field, in the order
    /// `@join__field` applications appear in the composed schema.
    pub owners: IndexMap<Name, FieldOwnership>,
}

impl FieldFederationMetadata {
    pub fn resolvable_owners(&self) -> impl Iterator<Item = (&Name, &FieldOwnership)> {
        self.owners.iter().filter(|(_, o)| !o.external)
    }

    /// The canonical owner service for this field: the first subgraph (in
    /// declaration order) able to actually resolve it.
    pub fn owner(&self) -> Option<&Name> {
        self.resolvable_owners().next().map(|(name, _)| name)
    }

    pub fn ownership(&self, service: &Name) -> Option<&FieldOwnership> {
        self.owners.get(service)
    }

    /// Whether `service` actually computes this field's value (owner match,
    /// spec §4.2.1 rule 2).
    pub fn is_resolvable_by(&self, service: &Name) -> bool {
        self.ownership(service).map_or(false, |o| !o.external)
    }

    /// Whether `service` can *select* this field at all, even if only to
    /// forward an `@external` value declared elsewhere (used when checking
    /// whether a key or `@requires` field set can be sent by a given
    /// service, spec §4.2.2).
    pub fn is_selectable_by(&self, service: &Name) -> bool {
        self.owners.is_empty() || self.owners.contains_key(service)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FederationMetadata {
    pub subgraphs: IndexMap<Name, SubgraphInfo>,
    types: IndexMap<Name, TypeFederationMetadata>,
    fields: IndexMap<(Name, Name), FieldFederationMetadata>,
}

impl FederationMetadata {
    pub fn type_metadata(&self, type_name: &Name) -> Option<&TypeFederationMetadata> {
        self.types.get(type_name)
    }

    pub fn field_metadata(
        &self,
        type_name: &Name,
        field_name: &Name,
    ) -> Option<&FieldFederationMetadata> {
        self.fields.get(&(type_name.clone(), field_name.clone()))
    }

    pub fn is_entity(&self, type_name: &Name) -> bool {
        self.types
            .get(type_name)
            .map_or(false, TypeFederationMetadata::is_entity)
    }

    /// Picks the key `target_service` declares on `type_name` that is
    /// resolvable by `parent_service` — i.e. every field in the key can be
    /// selected from `parent_service`'s view of the type. Keys are tried in
    /// declaration order (spec §4.2.2).
    pub fn select_key(
        &self,
        type_name: &Name,
        target_service: &Name,
        parent_service: &Name,
    ) -> Option<Vec<Name>> {
        let type_metadata = self.types.get(type_name)?;
        let resolvable = |key: &&Vec<Name>| {
            key.iter().all(|field_name| {
                self.field_metadata(type_name, field_name)
                    .map_or(true, |f| f.is_selectable_by(parent_service))
            })
        };
        // Prefer a key `target_service` declares itself...
        if let Some(keys) = type_metadata.keys.get(target_service) {
            if let Some(key) = keys.iter().find(resolvable) {
                return Some(key.clone());
            }
        }
        // ...falling back to any key declared for this entity by another
        // subgraph, in declaration order. Real supergraphs generally give
        // every subgraph that references an entity its own `@key`, but
        // sharing a key declared elsewhere is common enough (e.g. a subgraph
        // that only ever receives the entity as a `@requires`/`@provides`
        // target) that this fallback keeps `select_key` from spuriously
        // reporting `UNSATISFIABLE_KEY`.
        type_metadata
            .all_keys()
            .map(|(_, key)| key)
            .find(resolvable)
            .cloned()
    }


    fn extract(schema: &Valid<Schema>) -> Result<Self, FederationError> {
        let mut metadata = FederationMetadata::default();

        if let Some(ExtendedType::Enum(graph_enum)) = schema.types.get(JOIN_GRAPH_ENUM) {
            for enum_value in graph_enum.values.values() {
                let Some(directive) = enum_value.directives.get(JOIN_GRAPH_DIRECTIVE) else {
                    continue;
                };
                let name = required_enum_or_string_argument(directive, "name")?;
                let url = optional_string_argument(directive, "url")?.unwrap_or_default();
                metadata
                    .subgraphs
                    .insert(name.clone(), SubgraphInfo { name, url });
            }
        }

        for (type_name, extended_type) in &schema.types {
            let (directives, fields) = match extended_type {
                ExtendedType::Object(obj) => (&obj.directives, Some(&obj.fields)),
                ExtendedType::Interface(iface) => (&iface.directives, Some(&iface.fields)),
                _ => continue,
            };

            let mut type_metadata = TypeFederationMetadata::default();
            for directive in directives.get_all(JOIN_TYPE_DIRECTIVE) {
                let graph = required_enum_or_string_argument(directive, "graph")?;
                type_metadata.owning_graphs.insert(graph.clone());
                if let Some(key) = optional_string_argument(directive, "key")? {
                    let key_fields = field_set::parse_field_set(schema, type_name, &key)?;
                    type_metadata
                        .keys
                        .entry(graph)
                        .or_default()
                        .push(key_fields);
                }
            }
            let owning_graphs = type_metadata.owning_graphs.clone();
            metadata.types.insert(type_name.clone(), type_metadata);

            let Some(fields) = fields else { continue };
            for (field_name, field) in fields {
                let mut field_metadata = FieldFederationMetadata::default();
                let join_fields: Vec<_> = field.directives.get_all(JOIN_FIELD_DIRECTIVE).collect();
                if join_fields.is_empty() {
                    // A field with no `@join__field` applications is owned by
                    // every graph that declares the parent type, in the order
                    // those graphs were declared for the type. Real-world
                    // supergraphs normally annotate every field explicitly;
                    // this fallback only matters for hand-written schemas.
                    for graph in &owning_graphs {
                        field_metadata.owners.insert(
                            graph.clone(),
                            FieldOwnership {
                                requires: Vec::new(),
                                provides: Vec::new(),
                                external: false,
                            },
                        );
                    }
                } else {
                    for directive in join_fields {
                        let Some(graph) = optional_enum_or_string_argument(directive, "graph")?
                        else {
                            continue;
                        };
                        let requires = match optional_string_argument(directive, "requires")? {
                            Some(fields) => field_set::parse_field_set(schema, type_name, &fields)?,
                            None => Vec::new(),
                        };
                        let provides = match optional_string_argument(directive, "provides")? {
                            Some(fields) => {
                                let return_type = field.ty.inner_named_type();
                                field_set::parse_field_set(schema, return_type, &fields)?
                            }
                            None => Vec::new(),
                        };
                        let external = optional_boolean_argument(directive, "external")?
                            .unwrap_or(false);
                        field_metadata.owners.insert(
                            graph,
                            FieldOwnership {
                                requires,
                                provides,
                                external,
                            },
                        );
                    }
                }
                metadata
                    .fields
                    .insert((type_name.clone(), field_name.clone()), field_metadata);
            }
        }

        Ok(metadata)
    }
}

fn optional_string_argument(
    application: &Node<Directive>,
    name: &str,
) -> Result<Option<String>, FederationError> {
    let Some(argument) = application.arguments.iter().find(|a| a.name == name) else {
        return Ok(None);
    };
    match argument.value.as_ref() {
        ast::Value::String(s) => Ok(Some(s.to_string())),
        ast::Value::Null => Ok(None),
        _ => Err(SingleFederationError::InvalidGraphQL {
            message: format!("argument \"{name}\" of @{} must be a string", application.name),
        }
        .into()),
    }
}

fn optional_boolean_argument(
    application: &Node<Directive>,
    name: &str,
) -> Result<Option<bool>, FederationError> {
    let Some(argument) = application.arguments.iter().find(|a| a.name == name) else {
        return Ok(None);
    };
    match argument.value.as_ref() {
        ast::Value::Boolean(b) => Ok(Some(*b)),
        ast::Value::Null => Ok(None),
        _ => Err(SingleFederationError::InvalidGraphQL {
            message: format!("argument \"{name}\" of @{} must be a boolean", application.name),
        }
        .into()),
    }
}

/// `graph:` arguments are typed as the `join__Graph` enum, but are read here
/// leniently as either an enum value or a bare string.
fn optional_enum_or_string_argument(
    application: &Node<Directive>,
    name: &str,
) -> Result<Option<Name>, FederationError> {
    let Some(argument) = application.arguments.iter().find(|a| a.name == name) else {
        return Ok(None);
    };
    match argument.value.as_ref() {
        ast::Value::Enum(value) => Ok(Some(value.clone())),
        ast::Value::String(value) => Ok(Some(Name::new(value.as_str()).map_err(|e| {
            SingleFederationError::InvalidGraphQL {
                message: format!("invalid graph name \"{value}\": {e}"),
            }
        })?)),
        ast::Value::Null => Ok(None),
        _ => Err(SingleFederationError::InvalidGraphQL {
            message: format!(
                "argument \"{name}\" of @{} must be an enum value or string",
                application.name
            ),
        }
        .into()),
    }
}

fn required_enum_or_string_argument(
    application: &Node<Directive>,
    name: &str,
) -> Result<Name, FederationError> {
    optional_enum_or_string_argument(application, name)?.ok_or_else(|| {
        SingleFederationError::InvalidGraphQL {
            message: format!(
                "required argument \"{name}\" of @{} was not present",
                application.name
            ),
        }
        .into()
    })
}

/// A fully parsed and validated supergraph schema, with federation metadata
/// attached for every type and field.
#[derive(Debug, Clone)]
pub struct ComposedSchema {
    schema: Valid<Schema>,
    metadata: FederationMetadata,
}

impl ComposedSchema {
    /// Parses and validates `source_text` as a supergraph SDL document, then
    /// extracts federation metadata from its `@join__*` directives.
    pub fn parse(source_text: &str) -> Result<Self, FederationError> {
        let schema = Schema::parse_and_validate(source_text, "supergraph.graphql")?;
        let metadata = FederationMetadata::extract(&schema)?;
        log::debug!(
            "parsed composed schema with {} subgraph(s), {} federated type(s)",
            metadata.subgraphs.len(),
            metadata.types.len(),
        );
        Ok(Self { schema, metadata })
    }

    pub fn schema(&self) -> &Valid<Schema> {
        &self.schema
    }

    pub fn metadata(&self) -> &FederationMetadata {
        &self.metadata
    }

    /// The root operation type name for `operation_type` (`Query`,
    /// `Mutation`, or `Subscription`), if the schema declares one.
    pub fn root_operation(&self, operation_type: ast::OperationType) -> Option<&Name> {
        self.schema.root_operation(operation_type)
    }

    /// All object types whose declared interfaces or union memberships make
    /// them a possible runtime type for `abstract_type_name`, in schema
    /// declaration order.
    pub fn possible_types(&self, abstract_type_name: &Name) -> Vec<Name> {
        match self.schema.types.get(abstract_type_name) {
            Some(ExtendedType::Interface(_)) => self
                .schema
                .types
                .iter()
                .filter_map(|(name, ty)| match ty {
                    ExtendedType::Object(obj)
                        if obj.implements_interfaces.contains(abstract_type_name) =>
                    {
                        Some(name.clone())
                    }
                    _ => None,
                })
                .collect(),
            Some(ExtendedType::Union(union_)) => union_
                .members
                .iter()
                .filter_map(|m| Name::new(m.to_string()).ok())
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn is_abstract_type(&self, type_name: &Name) -> bool {
        matches!(
            self.schema.types.get(type_name),
            Some(ExtendedType::Interface(_)) | Some(ExtendedType::Union(_))
        )
    }

    /// Whether `object_type` implements `interface_name` — used to decide
    /// whether an inline fragment written against an interface applies when
    /// flattening selections down onto one of the interface's members.
    pub fn implements_interface(&self, object_type: &Name, interface_name: &Name) -> bool {
        matches!(
            self.schema.types.get(object_type),
            Some(ExtendedType::Object(obj)) if obj.implements_interfaces.contains(interface_name)
        )
    }

    /// The declared type of `field_name` on `type_name` (object or
    /// interface), if any.
    pub fn field_type(&self, type_name: &Name, field_name: &Name) -> Option<ast::Type> {
        match self.schema.types.get(type_name)? {
            ExtendedType::Object(obj) => obj.fields.get(field_name).map(|f| f.ty.clone()),
            ExtendedType::Interface(iface) => iface.fields.get(field_name).map(|f| f.ty.clone()),
            _ => None,
        }
    }
}

/// Whether a field's declared type is (eventually) a list, i.e. whether a
/// `@` response-path segment is needed when descending into it (spec
/// §4.2.4).
pub fn is_list_type(ty: &ast::Type) -> bool {
    matches!(ty, ast::Type::List(_) | ast::Type::NonNullList(_))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = include_str!("../../tests/fixtures/test_supergraph.graphql");

    fn name(s: &str) -> Name {
        Name::new(s).unwrap()
    }

    #[test]
    fn root_operation_and_possible_types() {
        let schema = ComposedSchema::parse(SCHEMA).expect("valid supergraph");
        assert_eq!(
            schema.root_operation(ast::OperationType::Query),
            Some(&name("Query"))
        );
        let mut members: Vec<_> = schema
            .possible_types(&name("Product"))
            .into_iter()
            .map(|n| n.to_string())
            .collect();
        members.sort();
        assert_eq!(members, vec!["Book".to_string(), "Furniture".to_string()]);
        assert!(schema.is_abstract_type(&name("Product")));
        assert!(!schema.is_abstract_type(&name("Book")));
    }

    #[test]
    fn user_is_an_entity_with_one_key_per_subgraph() {
        let schema = ComposedSchema::parse(SCHEMA).expect("valid supergraph");
        let user = schema.metadata().type_metadata(&name("User")).unwrap();
        assert!(user.is_entity());
        assert_eq!(user.keys.get(&name("accounts")).unwrap(), &vec![vec![name("id")]]);
        assert_eq!(user.keys.get(&name("reviews")).unwrap(), &vec![vec![name("id")]]);
    }

    #[test]
    fn select_key_prefers_target_services_own_key() {
        let schema = ComposedSchema::parse(SCHEMA).expect("valid supergraph");
        let key = schema
            .metadata()
            .select_key(&name("User"), &name("reviews"), &name("accounts"))
            .expect("accounts can supply User's id key");
        assert_eq!(key, vec![name("id")]);
    }

    #[test]
    fn field_ownership_reflects_requires_and_external() {
        let schema = ComposedSchema::parse(SCHEMA).expect("valid supergraph");
        let book_name = schema
            .metadata()
            .field_metadata(&name("Book"), &name("name"))
            .expect("Book.name has federation metadata");
        let product_ownership = book_name.ownership(&name("product")).unwrap();
        assert_eq!(product_ownership.requires, vec![name("title"), name("year")]);
        assert!(!product_ownership.external);
        assert_eq!(book_name.owner(), Some(&name("product")));
    }
}
