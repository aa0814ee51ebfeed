//! Core types for declaration resolution.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::schema::SchemaType;

/// Default struct tag namespace used to name body fields.
pub const DEFAULT_STRUCT_TAG: &str = "json";

/// Where a resolved type is used.
///
/// Path, query and form types are rendered as individual parameters rather
/// than a nested object, so their fields keep their own `required` markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Context {
    #[default]
    Body,
    Query,
    Path,
    Form,
}

impl Context {
    /// True for contexts rendered as flat parameter lists.
    pub fn is_parameter(&self) -> bool {
        matches!(self, Context::Query | Context::Path | Context::Form)
    }

    /// Struct tag namespace used to name fields in this context.
    pub fn tag_name<'a>(&self, struct_tag: &'a str) -> &'a str {
        match self {
            Context::Body => struct_tag,
            Context::Query => "query",
            Context::Path => "path",
            Context::Form => "form",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Context::Body => "body",
            Context::Query => "query",
            Context::Path => "path",
            Context::Form => "form",
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Context {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "body" => Ok(Context::Body),
            "query" => Ok(Context::Query),
            "path" => Ok(Context::Path),
            "form" => Ok(Context::Form),
            other => Err(format!(
                "unknown context {other:?}: expected body, query, path, or form"
            )),
        }
    }
}

/// A configured mapping from a qualified type name to a schema type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedType {
    pub ty: SchemaType,
    pub format: Option<String>,
}

impl FromStr for MappedType {
    type Err = String;

    /// Parse `TYPE[:FORMAT]`, e.g. `string:date-time`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ty, format) = match s.split_once(':') {
            Some((ty, format)) => (ty.trim(), Some(format.trim().to_string())),
            None => (s.trim(), None),
        };
        let ty = SchemaType::parse(ty)
            .filter(SchemaType::is_primitive)
            .ok_or_else(|| format!("{ty:?} is not a primitive schema type"))?;
        Ok(MappedType {
            ty,
            format: format.filter(|f| !f.is_empty()),
        })
    }
}

/// Options for a resolution run.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Struct tag namespace for body fields (e.g. `json`).
    pub struct_tag: String,
    /// Qualified type names (e.g. `time.Time`) mapped straight to a schema
    /// type, bypassing declaration lookup.
    pub map_types: BTreeMap<String, MappedType>,
    /// Base directory that declaration file paths are relative to. Used to
    /// locate `{schema: ...}` override documents.
    pub source_root: PathBuf,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolveOptions {
    /// Create options with the `json` struct tag and `time.Time` mapped to a
    /// `date-time` string.
    pub fn new() -> Self {
        let mut map_types = BTreeMap::new();
        map_types.insert(
            "time.Time".to_string(),
            MappedType {
                ty: SchemaType::String,
                format: Some("date-time".to_string()),
            },
        );
        Self {
            struct_tag: DEFAULT_STRUCT_TAG.to_string(),
            map_types,
            source_root: PathBuf::from("."),
        }
    }

    /// Set the struct tag namespace used for body fields.
    pub fn struct_tag(mut self, tag: impl Into<String>) -> Self {
        self.struct_tag = tag.into();
        self
    }

    /// Map a qualified type name to a schema type.
    pub fn map_type(mut self, name: impl Into<String>, mapped: MappedType) -> Self {
        self.map_types.insert(name.into(), mapped);
        self
    }

    /// Set the directory declaration file paths are relative to.
    pub fn source_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.source_root = root.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_parameter_kinds() {
        assert!(!Context::Body.is_parameter());
        assert!(Context::Query.is_parameter());
        assert!(Context::Path.is_parameter());
        assert!(Context::Form.is_parameter());
    }

    #[test]
    fn context_tag_name() {
        assert_eq!(Context::Body.tag_name("json"), "json");
        assert_eq!(Context::Body.tag_name("yaml"), "yaml");
        assert_eq!(Context::Query.tag_name("json"), "query");
        assert_eq!(Context::Form.tag_name("json"), "form");
    }

    #[test]
    fn context_from_str_is_case_insensitive() {
        assert_eq!("Query".parse::<Context>(), Ok(Context::Query));
        assert!("header".parse::<Context>().is_err());
    }

    #[test]
    fn mapped_type_parse() {
        let mapped: MappedType = "string:date-time".parse().unwrap();
        assert_eq!(mapped.ty, SchemaType::String);
        assert_eq!(mapped.format.as_deref(), Some("date-time"));

        let mapped: MappedType = "integer".parse().unwrap();
        assert_eq!(mapped.ty, SchemaType::Integer);
        assert!(mapped.format.is_none());

        assert!("object".parse::<MappedType>().is_err());
        assert!("bogus".parse::<MappedType>().is_err());
    }

    #[test]
    fn default_options() {
        let opts = ResolveOptions::default();
        assert_eq!(opts.struct_tag, "json");
        assert!(opts.map_types.contains_key("time.Time"));
    }

    #[test]
    fn builder_overrides() {
        let opts = ResolveOptions::new()
            .struct_tag("yaml")
            .map_type("decimal.Decimal", "number".parse().unwrap())
            .source_root("/src");
        assert_eq!(opts.struct_tag, "yaml");
        assert_eq!(
            opts.map_types["decimal.Decimal"].ty,
            SchemaType::Number
        );
        assert_eq!(opts.source_root, PathBuf::from("/src"));
    }
}
