//! Parsing of field-set strings (the argument type of `@key`/`@requires`/
//! `@provides`) into a flat list of field names validated against the schema.
//!
//! The federation spec's `FieldSet` scalar permits arbitrarily nested
//! selections (`"organization { id }"`); every key, `@requires`, and
//! `@provides` field set that appears in this crate's supported scenarios is
//! flat (`"id"`, `"price"`, `"title year"`), so field sets are modeled here as
//! an ordered list of top-level field names rather than a full selection
//! tree. See `DESIGN.md` for the corresponding Open Question resolution.

use apollo_compiler::schema::ExtendedType;
use apollo_compiler::validation::Valid;
use apollo_compiler::{Name, Schema};

use crate::error::{FederationError, SingleFederationError};

/// Parses a field-set string as a flat, ordered list of field names and
/// validates that each one is a field of `parent_type_name` in `schema`.
pub(crate) fn parse_field_set(
    schema: &Valid<Schema>,
    parent_type_name: &Name,
    field_set: &str,
) -> Result<Vec<Name>, FederationError> {
    let Some(ty) = schema.types.get(parent_type_name) else {
        return Err(SingleFederationError::SchemaValidation {
            message: format!("type \"{parent_type_name}\" is not defined in the schema"),
        }
        .into());
    };
    let fields = match ty {
        ExtendedType::Object(obj) => &obj.fields,
        ExtendedType::Interface(iface) => &iface.fields,
        _ => {
            return Err(SingleFederationError::SchemaValidation {
                message: format!("type \"{parent_type_name}\" cannot carry a field set"),
            }
            .into())
        }
    };
    field_set
        .split_whitespace()
        .map(|token| {
            let name = Name::new(token).map_err(|e| SingleFederationError::SchemaValidation {
                message: format!("invalid field name \"{token}\" in field set: {e}"),
            })?;
            if !fields.contains_key(&name) {
                return Err(SingleFederationError::SchemaValidation {
                    message: format!(
                        "field set references undefined field \"{name}\" on type \"{parent_type_name}\""
                    ),
                }
                .into());
            }
            Ok(name)
        })
        .collect()
}
