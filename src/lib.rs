//! Declaration Schema Resolver
//!
//! Turns documented type declarations into renderer-agnostic schema trees.
//!
//! A declaration document lists packages, their files, and the named types
//! declared in each. Resolving a type produces a registry of named
//! references: each struct reached from the requested type is resolved
//! once, and every other use of it becomes a `$ref` to that entry.
//!
//! # Example
//!
//! ```
//! use docschema::{load_declarations_str, resolve, Context, ResolveOptions, SchemaType};
//!
//! let decls = load_declarations_str(r#"{
//!     "packages": [{
//!         "path": "example.com/shop/models",
//!         "files": [{
//!             "path": "models/user.go",
//!             "types": [{
//!                 "name": "User",
//!                 "doc": "A registered user.",
//!                 "type": { "struct": [
//!                     { "name": "ID", "type": "int64", "tag": "json:\"id\"", "doc": "{required}" },
//!                     { "name": "Friends", "type": "[]*User", "tag": "json:\"friends\"" }
//!                 ]}
//!             }]
//!         }]
//!     }]
//! }"#).unwrap();
//!
//! let registry = resolve(&decls, &[("models.User", Context::Body)], &ResolveOptions::new()).unwrap();
//! let user = &registry.get("models.User").unwrap().schema;
//!
//! assert_eq!(user.required, vec!["id"]);
//! assert_eq!(user.properties["id"].ty, Some(SchemaType::Integer));
//! // The recursive field points back at the same entry.
//! assert_eq!(
//!     user.properties["friends"].items.as_ref().unwrap().reference.as_deref(),
//!     Some("models.User")
//! );
//! ```
//!
//! # Directives
//!
//! Field and type documentation may carry `{directive}` tokens:
//!
//! | Directive | Effect |
//! |-----------|--------|
//! | `{required}` | Field listed in the parent's `required` (body context only) |
//! | `{optional}` | No effect |
//! | `{readonly}` | `readOnly: true` |
//! | `{omitdoc}` | Hidden from documented definitions |
//! | `{date-time}`, `{date}`, `{time}`, `{email}`, `{hostname}`, `{uri}` | `format` |
//! | `{enum: a b c}` | Enumerated values |
//! | `{default: v}` | `default` |
//! | `{range: min-max}` | `minimum` / `maximum` |
//! | `{schema: file.json}` | Hand-written schema replaces the declared type |
//!
//! Other braces in documentation (for example JSON snippets) are left in
//! the description text.

mod decl;
mod directive;
mod error;
mod linter;
mod loader;
mod locator;
mod mapper;
mod registry;
mod resolver;
mod schema;
mod tag;
mod types;
mod validator;

pub use decl::{DeclarationSet, FieldDecl, Package, SourceFile, TypeDecl, TypeExpr};
pub use directive::{extract as extract_directives, parse_doc, Directive};
pub use error::{ResolveError, SchemaError, ValidateError};
pub use linter::{lint, lint_declarations, Diagnostic, LintResult, LintStatus, Severity, TypeResult};
pub use loader::{load_declarations, load_declarations_str, load_json, load_schema_override};
pub use locator::{Canonical, Located, Scope, SymbolTable};
pub use mapper::{kind, map_type, Mapped};
pub use registry::{EntryState, Param, Reference, Registry};
pub use resolver::{resolve, Resolver};
pub use schema::{Schema, SchemaType};
pub use types::{Context, MappedType, ResolveOptions, DEFAULT_STRUCT_TAG};
pub use validator::{schema_document, validate, validate_against_schema};
