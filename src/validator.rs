//! Payload validation against resolved declarations.

use serde_json::{json, Map, Value};

use crate::decl::DeclarationSet;
use crate::error::{SchemaError, ValidateError};
use crate::locator::SymbolTable;
use crate::registry::Registry;
use crate::resolver::Resolver;
use crate::schema::{Schema, SchemaType};
use crate::types::{Context, ResolveOptions};

const DRAFT: &str = "https://json-schema.org/draft/2020-12/schema";

/// Build a standalone JSON Schema document rooted at `root`.
///
/// Every registry entry becomes a `$defs` member and registry keys in `$ref`
/// become local pointers. The `enum` pseudo-type takes the primitive type
/// of its values (string when unknown), and the literals are typed to
/// match. `{omitdoc}` properties are kept: they are hidden from docs, not
/// from the wire format.
pub fn schema_document(registry: &Registry, root: &str) -> Value {
    let defs: Map<String, Value> = registry
        .iter()
        .map(|(key, reference)| {
            let mut schema = reference.schema.clone();
            lower_enums(&mut schema);
            let mut schema = schema.to_json();
            rewrite(&mut schema);
            (key.to_string(), schema)
        })
        .collect();

    json!({
        "$schema": DRAFT,
        "$ref": def_pointer(root),
        "$defs": defs,
    })
}

fn def_pointer(key: &str) -> String {
    format!("#/$defs/{}", key.replace('~', "~0").replace('/', "~1"))
}

fn rewrite(node: &mut Value) {
    let Value::Object(map) = node else {
        return;
    };

    if let Some(Value::String(reference)) = map.get_mut("$ref") {
        *reference = def_pointer(reference);
    }
    if let Some(ty) = map.get("type").and_then(Value::as_str).map(str::to_string) {
        if let Some(Value::Array(values)) = map.get_mut("enum") {
            for value in values.iter_mut() {
                type_literal(&ty, value);
            }
        }
    }
    if let Some(Value::Object(properties)) = map.get_mut("properties") {
        for prop in properties.values_mut() {
            rewrite(prop);
        }
    }
    for key in ["items", "additionalProperties"] {
        if let Some(child) = map.get_mut(key) {
            rewrite(child);
        }
    }
}

fn lower_enums(schema: &mut Schema) {
    if schema.ty == Some(SchemaType::Enum) {
        schema.ty = Some(schema.enum_type.unwrap_or(SchemaType::String));
    }
    for prop in schema.properties.values_mut() {
        lower_enums(prop);
    }
    for child in [&mut schema.items, &mut schema.additional_properties]
        .into_iter()
        .flatten()
    {
        lower_enums(child);
    }
}

/// Enum literals are kept as text; parse them as the enum's type.
/// Literals that do not parse stay strings and fail validation.
fn type_literal(ty: &str, value: &mut Value) {
    let Value::String(text) = value else {
        return;
    };
    let typed = match ty {
        "integer" => text.parse::<i64>().ok().map(Value::from),
        "number" => text
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        "boolean" => text.parse::<bool>().ok().map(Value::from),
        _ => None,
    };
    if let Some(typed) = typed {
        *value = typed;
    }
}

/// Validate a payload against the declared type `key`.
///
/// Resolves the type, builds its schema document, then validates.
///
/// # Errors
///
/// Returns `ValidateError::Resolve` if resolution fails, or
/// `ValidateError::Invalid` if the payload doesn't match the schema.
pub fn validate(
    decls: &DeclarationSet,
    key: &str,
    context: Context,
    payload: &Value,
    options: &ResolveOptions,
) -> Result<(), ValidateError> {
    let symbols = SymbolTable::new(decls);
    let mut resolver = Resolver::new(&symbols, options);
    let root = resolver.request(key, context)?.key.clone();
    let registry = resolver.finish()?;

    validate_against_schema(&schema_document(&registry, &root), payload)
}

/// Validate a payload against an already-built schema document.
///
/// Use this when validating multiple payloads against the same schema.
pub fn validate_against_schema(schema: &Value, payload: &Value) -> Result<(), ValidateError> {
    let validator = jsonschema::validator_for(schema).map_err(|e| ValidateError::InvalidSchema {
        message: e.to_string(),
    })?;

    let errors: Vec<SchemaError> = validator
        .iter_errors(payload)
        .map(|e| SchemaError {
            path: e.instance_path.to_string(),
            message: e.to_string(),
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidateError::Invalid { errors })
    }
}
