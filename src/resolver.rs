//! Declaration resolution - turns named types into registry references.

use std::path::Path;

use tracing::{debug, warn};

use crate::decl::{DeclarationSet, FieldDecl, TypeExpr};
use crate::directive::{self, Directive};
use crate::error::ResolveError;
use crate::loader;
use crate::locator::{Canonical, Located, Scope, SymbolTable};
use crate::mapper::Mapped;
use crate::registry::{EntryState, Param, Reference, Registry};
use crate::schema::{Schema, SchemaType};
use crate::tag;
use crate::types::{Context, ResolveOptions};

/// Resolve the named types in `requests` and return the populated registry.
///
/// Each request is a `<package>.<TypeName>` key (the package part may be a
/// package name or its import path) and the context it is used in.
///
/// # Errors
///
/// Returns the first `ResolveError` encountered; nothing is returned for a
/// partially resolved run.
pub fn resolve(
    decls: &DeclarationSet,
    requests: &[(&str, Context)],
    options: &ResolveOptions,
) -> Result<Registry, ResolveError> {
    let symbols = SymbolTable::new(decls);
    let mut resolver = Resolver::new(&symbols, options);
    for (key, context) in requests {
        resolver.request(key, *context)?;
    }
    resolver.finish()
}

/// A struct field queued for resolution, with the scope its type is
/// written in. Embedded fields from other packages keep their own scope.
#[derive(Clone, Copy)]
struct FieldRef<'a> {
    scope: Scope<'a>,
    field: &'a FieldDecl,
}

enum Named<'a> {
    Leaf(Mapped),
    Reference(String),
    Other(Scope<'a>, &'a TypeExpr),
}

/// One resolution run over a symbol table.
///
/// The registry is only handed out by [`Resolver::finish`]; after any
/// error the run is aborted and later requests fail too.
pub struct Resolver<'a> {
    symbols: &'a SymbolTable<'a>,
    options: &'a ResolveOptions,
    registry: Registry,
    failure: Option<String>,
}

impl<'a> Resolver<'a> {
    pub fn new(symbols: &'a SymbolTable<'a>, options: &'a ResolveOptions) -> Self {
        Resolver {
            symbols,
            options,
            registry: Registry::new(),
            failure: None,
        }
    }

    /// Resolve a named type (and everything it refers to).
    ///
    /// Repeated requests for the same type return the cached reference.
    pub fn request(&mut self, key: &str, context: Context) -> Result<&Reference, ResolveError> {
        if let Some(message) = &self.failure {
            return Err(ResolveError::Aborted {
                message: message.clone(),
            });
        }

        match self.request_type(key, context) {
            Ok(resolved) => {
                self.registry
                    .get(&resolved)
                    .ok_or_else(|| ResolveError::UnresolvedType {
                        ident: key.to_string(),
                        package: String::new(),
                    })
            }
            Err(err) => {
                self.failure = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Hand out the registry of a successful run.
    pub fn finish(self) -> Result<Registry, ResolveError> {
        match self.failure {
            Some(message) => Err(ResolveError::Aborted { message }),
            None => Ok(self.registry),
        }
    }

    fn request_type(&mut self, key: &str, context: Context) -> Result<String, ResolveError> {
        let located = self.symbols.lookup(key)?;
        match self
            .symbols
            .canonical(self.options, located.scope, None, &located.decl.name)?
        {
            Canonical::Struct(target) | Canonical::Interface(target) => {
                self.reference(target, context, false)
            }
            _ => Err(ResolveError::UnsupportedTypeShape {
                ident: key.to_string(),
                shape: format!("{} is not a struct", located.decl.ty),
            }),
        }
    }

    /// Get or create the registry entry for a named struct or interface.
    fn reference(
        &mut self,
        located: Located<'a>,
        context: Context,
        is_embed: bool,
    ) -> Result<String, ResolveError> {
        let key = located.key();
        if let Some(state) = self.registry.state(&key) {
            if !is_embed {
                self.registry.clear_embed(&key);
            }
            if state == EntryState::Pending {
                debug!(%key, "cycle detected; referencing pending entry");
            }
            return Ok(key);
        }

        let Located { scope, decl, .. } = located;
        let mut reference = Reference::placeholder(
            key.as_str(),
            decl.name.as_str(),
            scope.package.path.as_str(),
            scope.file.path.as_str(),
            context,
        );
        reference.is_embed = is_embed;
        self.registry.begin(reference.clone());
        debug!(%key, %context, is_embed, "resolving type");

        let (info, directives) =
            directive::parse_doc(&decl.name, decl.doc.as_deref().unwrap_or(""))?;
        if directives.contains(&Directive::Required) {
            return Err(ResolveError::configuration(
                &decl.name,
                "required applies to fields, not types",
            ));
        }

        let mut schema = Schema {
            title: Some(decl.name.clone()),
            description: info.clone(),
            ..Default::default()
        };
        directive::apply_all(&decl.name, &directives, &mut schema);
        reference.info = info;

        if let Some(path) = directive::schema_override(&directives) {
            schema.overlay(self.load_override(scope, path)?);
        } else {
            match decl.ty.without_pointers() {
                TypeExpr::Struct(fields) => {
                    let mut collected = Vec::new();
                    let mut embedding = vec![key.clone()];
                    self.collect_fields(scope, fields, context, &mut collected, &mut embedding)?;
                    schema.ty = Some(SchemaType::Object);
                    reference.fields =
                        self.add_fields(&mut schema, &collected, context, !context.is_parameter())?;
                }
                TypeExpr::Interface => {
                    debug!(%key, "interface registered as placeholder");
                }
                other => {
                    return Err(ResolveError::UnsupportedTypeShape {
                        ident: key,
                        shape: format!("{} is not a struct", other.shape()),
                    })
                }
            }
        }

        reference.schema = schema;
        self.registry.complete(reference);
        Ok(key)
    }

    /// Queue the fields of a struct, flattening untagged embedded structs.
    ///
    /// `embedding` holds the structs currently being flattened and stops
    /// an embed from pulling itself in again.
    fn collect_fields(
        &mut self,
        scope: Scope<'a>,
        fields: &'a [FieldDecl],
        context: Context,
        out: &mut Vec<FieldRef<'a>>,
        embedding: &mut Vec<String>,
    ) -> Result<(), ResolveError> {
        let options = self.options;
        let tag_key = context.tag_name(&options.struct_tag);

        for field in fields {
            if field.is_embedded() {
                let (name, _) = tag::name_and_attrs(field.tag.as_deref(), tag_key);
                if name == "-" {
                    continue;
                }
                if name.is_empty() && self.flatten_embedded(scope, field, context, out, embedding)? {
                    continue;
                }
            }
            out.push(FieldRef { scope, field });
        }
        Ok(())
    }

    /// Flatten an embedded field's struct into `out`.
    ///
    /// Returns false when the embedded type is not a struct, in which case
    /// it is kept as an ordinary field named after its type.
    fn flatten_embedded(
        &mut self,
        scope: Scope<'a>,
        field: &'a FieldDecl,
        context: Context,
        out: &mut Vec<FieldRef<'a>>,
        embedding: &mut Vec<String>,
    ) -> Result<bool, ResolveError> {
        let (qualifier, name) = match field.ty.without_pointers() {
            TypeExpr::Ident(name) => (None, name.as_str()),
            TypeExpr::Qualified { package, name } => (Some(package.as_str()), name.as_str()),
            _ => return Ok(false),
        };

        match self.symbols.canonical(self.options, scope, qualifier, name)? {
            Canonical::Struct(target) => {
                let key = target.key();
                if embedding.contains(&key) {
                    debug!(%key, "recursive embed skipped");
                    return Ok(true);
                }
                self.reference(target, context, true)?;
                if let TypeExpr::Struct(fields) = target.decl.ty.without_pointers() {
                    embedding.push(key);
                    self.collect_fields(target.scope, fields, context, out, embedding)?;
                    embedding.pop();
                }
                Ok(true)
            }
            Canonical::Interface(target) => {
                debug!(key = %target.key(), "embedded interface skipped");
                Ok(true)
            }
            Canonical::Mapped(_) | Canonical::Other(..) => Ok(false),
        }
    }

    /// Resolve `fields` into properties of `schema`.
    ///
    /// With `lift_required`, a field's `{required}` marker names it in the
    /// `required` list of `schema` instead of its own.
    fn add_fields(
        &mut self,
        schema: &mut Schema,
        fields: &[FieldRef<'a>],
        context: Context,
        lift_required: bool,
    ) -> Result<Vec<Param>, ResolveError> {
        let options = self.options;
        let tag_key = context.tag_name(&options.struct_tag);
        let mut params = Vec::with_capacity(fields.len());

        for FieldRef { scope, field } in fields.iter().copied() {
            let (tag_name, attrs) = tag::name_and_attrs(field.tag.as_deref(), tag_key);
            if tag_name == "-" {
                continue;
            }
            let name = if tag_name.is_empty() {
                field.source_name()
            } else {
                tag_name
            };

            let (prop, required) =
                self.field_schema(scope, name, field, &attrs, context, lift_required)?;
            if required {
                schema.add_required(name);
            }
            schema.insert_property(name, prop);
            params.push(Param {
                name: name.to_string(),
                field: field.clone(),
                package: scope.package.path.clone(),
                file: scope.file.path.clone(),
            });
        }
        Ok(params)
    }

    /// Schema for one field, and whether the field was lifted into its
    /// parent's `required` list.
    fn field_schema(
        &mut self,
        scope: Scope<'a>,
        name: &str,
        field: &'a FieldDecl,
        attrs: &[&str],
        context: Context,
        lift_required: bool,
    ) -> Result<(Schema, bool), ResolveError> {
        let (description, mut directives) = directive::parse_doc(name, field.documentation())?;
        let lifted = lift_required && directives.contains(&Directive::Required);
        if lifted {
            directives.retain(|d| *d != Directive::Required);
        }

        let mut prop = Schema {
            description,
            ..Default::default()
        };
        directive::apply_all(name, &directives, &mut prop);
        if attrs.contains(&"readonly") {
            prop.read_only = Some(true);
        }

        // The declared type is not resolved at all when overridden.
        if let Some(path) = directive::schema_override(&directives) {
            prop.overlay(self.load_override(scope, path)?);
            return Ok((prop, lifted));
        }

        let prop = self.resolve_type(scope, name, &field.ty, prop, context)?;
        Ok((prop, lifted))
    }

    fn resolve_type(
        &mut self,
        scope: Scope<'a>,
        name: &str,
        ty: &'a TypeExpr,
        mut prop: Schema,
        context: Context,
    ) -> Result<Schema, ResolveError> {
        let mut scope = scope;
        let mut ty = ty;

        loop {
            let (qualifier, ident) = match ty {
                TypeExpr::Pointer(inner) => {
                    ty = &**inner;
                    continue;
                }
                TypeExpr::Ident(ident) => (None, ident.as_str()),
                TypeExpr::Qualified { package, name } => (Some(package.as_str()), name.as_str()),
                TypeExpr::Struct(fields) => {
                    let mut collected = Vec::new();
                    self.collect_fields(scope, fields, context, &mut collected, &mut Vec::new())?;
                    prop.ty = Some(SchemaType::Object);
                    self.add_fields(&mut prop, &collected, context, !context.is_parameter())?;
                    return Ok(prop);
                }
                TypeExpr::Interface => return Ok(prop),
                TypeExpr::Map { value, .. } => {
                    prop.ty = Some(SchemaType::Object);
                    prop.additional_properties =
                        self.map_value(scope, name, value, context)?.map(Box::new);
                    return Ok(prop);
                }
                TypeExpr::Array(elem) => {
                    self.resolve_array(scope, name, elem, &mut prop, context)?;
                    return Ok(prop);
                }
                TypeExpr::Opaque(source) => {
                    return Err(ResolveError::UnsupportedTypeShape {
                        ident: name.to_string(),
                        shape: source.clone(),
                    })
                }
            };

            match self.resolve_named(scope, qualifier, ident, context)? {
                Named::Leaf(mapped) => {
                    apply_leaf(&mut prop, mapped);
                    return Ok(prop);
                }
                Named::Reference(key) => return Ok(prop.into_reference(key)),
                Named::Other(next_scope, next) => {
                    scope = next_scope;
                    ty = next;
                }
            }
        }
    }

    fn resolve_named(
        &mut self,
        scope: Scope<'a>,
        qualifier: Option<&str>,
        ident: &str,
        context: Context,
    ) -> Result<Named<'a>, ResolveError> {
        let canonical = self.symbols.canonical(self.options, scope, qualifier, ident)?;
        self.named(canonical, context)
    }

    fn named(&mut self, canonical: Canonical<'a>, context: Context) -> Result<Named<'a>, ResolveError> {
        Ok(match canonical {
            Canonical::Mapped(mapped) => Named::Leaf(mapped),
            Canonical::Struct(target) | Canonical::Interface(target) => {
                Named::Reference(self.reference(target, context, false)?)
            }
            Canonical::Other(scope, ty) => Named::Other(scope, ty),
        })
    }

    /// `[]T`: primitive elements become inline items, structs and
    /// interfaces become references. `[]byte` is a string.
    fn resolve_array(
        &mut self,
        scope: Scope<'a>,
        name: &str,
        elem: &'a TypeExpr,
        prop: &mut Schema,
        context: Context,
    ) -> Result<(), ResolveError> {
        prop.ty = Some(SchemaType::Array);

        let unsupported = |shape: &str| ResolveError::UnsupportedTypeShape {
            ident: name.to_string(),
            shape: format!("array of {shape}"),
        };

        let (qualifier, ident) = match elem.without_pointers() {
            TypeExpr::Ident(ident) => (None, ident.as_str()),
            TypeExpr::Qualified { package, name } => (Some(package.as_str()), name.as_str()),
            TypeExpr::Interface => {
                prop.items = Some(Box::new(Schema::default()));
                return Ok(());
            }
            other => return Err(unsupported(other.shape())),
        };

        if qualifier.is_none() && ident == "byte" {
            prop.ty = Some(SchemaType::String);
            return Ok(());
        }

        let items = match self.resolve_named(scope, qualifier, ident, context)? {
            Named::Leaf(mapped) => mapped.to_schema(),
            Named::Reference(key) => Schema::reference_to(key),
            Named::Other(_, other) => return Err(unsupported(other.shape())),
        };
        prop.items = Some(Box::new(items));
        Ok(())
    }

    /// Schema for the values of a `map[K]V`.
    ///
    /// A value type that cannot be found, or has no schema shape, leaves
    /// `additionalProperties` unset.
    fn map_value(
        &mut self,
        scope: Scope<'a>,
        name: &str,
        value: &'a TypeExpr,
        context: Context,
    ) -> Result<Option<Schema>, ResolveError> {
        let (qualifier, ident) = match value.without_pointers() {
            TypeExpr::Ident(ident) => (None, ident.as_str()),
            TypeExpr::Qualified { package, name } => (Some(package.as_str()), name.as_str()),
            TypeExpr::Opaque(source) => {
                warn!(field = name, value = %source, "map value has no schema; additionalProperties left unset");
                return Ok(None);
            }
            other => {
                return self
                    .resolve_type(scope, name, other, Schema::default(), context)
                    .map(Some)
            }
        };

        let canonical = match self.symbols.canonical(self.options, scope, qualifier, ident) {
            Ok(canonical) => canonical,
            Err(ResolveError::UnresolvedType { ident, package }) => {
                warn!(field = name, %ident, %package, "map value type not found; additionalProperties left unset");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        match self.named(canonical, context)? {
            Named::Leaf(mapped) => Ok(Some(mapped.to_schema())),
            Named::Reference(key) => Ok(Some(Schema::reference_to(key))),
            Named::Other(scope, other) => self.map_value(scope, name, other, context),
        }
    }

    /// Load a `{schema: ...}` document. Relative paths are taken from the
    /// directory of the file the directive appears in.
    fn load_override(&self, scope: Scope<'a>, path: &Path) -> Result<Schema, ResolveError> {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            let dir = Path::new(&scope.file.path)
                .parent()
                .unwrap_or_else(|| Path::new(""));
            self.options.source_root.join(dir).join(path)
        };
        debug!(path = %path.display(), "loading schema override");
        loader::load_schema_override(&path)
    }
}

/// Apply a mapped primitive to a field schema.
///
/// An `{enum}` type and a format set by a directive take precedence; an
/// enum records the primitive as the type of its values.
fn apply_leaf(prop: &mut Schema, mapped: Mapped) {
    if prop.ty == Some(SchemaType::Enum) {
        prop.enum_type = Some(mapped.ty);
    } else {
        prop.ty = Some(mapped.ty);
    }
    if prop.format.is_none() {
        prop.format = mapped.format;
    }
}
