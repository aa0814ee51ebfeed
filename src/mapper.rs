//! Primitive kind table and configured type mappings.

use crate::schema::{Schema, SchemaType};
use crate::types::ResolveOptions;

/// Predeclared kind names and their schema type.
const KIND_MAP: &[(&str, SchemaType)] = &[
    ("int", SchemaType::Integer),
    ("int8", SchemaType::Integer),
    ("int16", SchemaType::Integer),
    ("int32", SchemaType::Integer),
    ("int64", SchemaType::Integer),
    ("uint", SchemaType::Integer),
    ("uint8", SchemaType::Integer),
    ("uint16", SchemaType::Integer),
    ("uint32", SchemaType::Integer),
    ("uint64", SchemaType::Integer),
    ("uintptr", SchemaType::Integer),
    ("float32", SchemaType::Number),
    ("float64", SchemaType::Number),
    ("bool", SchemaType::Boolean),
    ("string", SchemaType::String),
    ("byte", SchemaType::String),
    ("rune", SchemaType::String),
    ("error", SchemaType::String),
];

/// Result of mapping a type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapped {
    pub ty: SchemaType,
    pub format: Option<String>,
}

impl Mapped {
    /// Leaf schema node for this mapping.
    pub fn to_schema(&self) -> Schema {
        Schema {
            ty: Some(self.ty),
            format: self.format.clone(),
            ..Default::default()
        }
    }
}

/// Look up a predeclared kind name.
pub fn kind(name: &str) -> Option<SchemaType> {
    KIND_MAP
        .iter()
        .find(|(kind, _)| *kind == name)
        .map(|(_, ty)| *ty)
}

/// Map a type name to a schema type.
///
/// `qualifier` is the package selector the name was written with, if any.
/// `package` is the name of the package the expression appears in; an
/// unqualified name is looked up in the configured mappings as
/// `<package>.<name>`. Predeclared kinds only match unqualified names.
///
/// Returns `None` when the name must be resolved through its declaration.
pub fn map_type(
    options: &ResolveOptions,
    package: &str,
    qualifier: Option<&str>,
    name: &str,
) -> Option<Mapped> {
    let lookup = format!("{}.{}", qualifier.unwrap_or(package), name);
    if let Some(mapped) = options.map_types.get(&lookup) {
        return Some(Mapped {
            ty: mapped.ty,
            format: mapped.format.clone(),
        });
    }

    if qualifier.is_some() {
        return None;
    }
    kind(name).map(|ty| Mapped { ty, format: None })
}
